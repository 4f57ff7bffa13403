//! Verification email delivery, §4.E step 4. Grounded on
//! `original_source/auth/services/mail.go`, which calls the SendGrid v3
//! API via the `sendgrid-go` SDK; ported here to a direct `reqwest` call
//! against the same endpoint since the workspace has no SendGrid binding.

use serde_json::json;

#[derive(Clone)]
pub struct MailService {
    http: reqwest::Client,
    api_key: String,
}

impl MailService {
    pub fn new(api_key: String) -> Self {
        MailService {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    pub async fn send_verification_email(&self, user_name: &str, user_email: &str, code: &str) -> Result<(), reqwest::Error> {
        let verify_url = format!("http://localhost/api/verify/{code}");
        let body = json!({
            "personalizations": [{ "to": [{ "email": user_email, "name": user_name }] }],
            "from": { "email": "dfs.pk.proj@gmail.com", "name": "DFS Team" },
            "subject": "Email verification for DFS",
            "content": [
                { "type": "text/plain", "value": format!("Go there and verify your account: {verify_url}") },
                { "type": "text/html", "value": format!("Go there and verify your account: <a href=\"{verify_url}\">DFS Account verification</a>") },
            ],
        });

        self.http
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

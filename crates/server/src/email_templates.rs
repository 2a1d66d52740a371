//! E-mail template rendering: HTML via Askama, plain text via `format!`.
use askama::Template;

/// Sent to the applicant right after self-registration.
#[derive(Template)]
#[template(path = "pending_registration_email.html")]
pub struct PendingRegistrationEmailTemplate {
    pub site_name: String,
    pub site_url: String,
    pub full_name: String,
    pub email: String,
    /// The plaintext password chosen at registration, mailed back to the applicant.
    pub password: String,
}

impl PendingRegistrationEmailTemplate {
    pub fn subject(&self) -> String {
        format!("{} - pending user registration", self.site_name)
    }

    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    #[tracing::instrument(skip(self))]
    pub fn render_text(&self) -> String {
        format!(
            r#"Hello {},

Thank you for registering with {}.

Your account is pending approval by an administrator. You will receive another
e-mail once it has been activated.

Your sign-in details:
  E-mail:   {}
  Password: {}

Best regards,
The {} Team
{}"#,
            self.full_name, self.site_name, self.email, self.password, self.site_name, self.site_url
        )
    }
}

/// Sent when an administrator approves a pending account.
#[derive(Template)]
#[template(path = "approval_email.html")]
pub struct ApprovalEmailTemplate {
    pub site_name: String,
    pub site_url: String,
    pub full_name: String,
}

impl ApprovalEmailTemplate {
    pub fn subject(&self) -> String {
        format!("{} - your account has been approved", self.site_name)
    }

    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    #[tracing::instrument(skip(self))]
    pub fn render_text(&self) -> String {
        format!(
            r#"Hello {},

Your {} account has been approved. You can now sign in at:
{}

Best regards,
The {} Team"#,
            self.full_name, self.site_name, self.site_url, self.site_name
        )
    }
}

/// Carries the password-reset link.
#[derive(Template)]
#[template(path = "password_reset_email.html")]
pub struct PasswordResetEmailTemplate {
    pub site_name: String,
    pub full_name: String,
    pub reset_url: String,
}

impl PasswordResetEmailTemplate {
    pub fn subject(&self) -> String {
        format!("{} - password reset request", self.site_name)
    }

    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    #[tracing::instrument(skip(self))]
    pub fn render_text(&self) -> String {
        format!(
            r#"Hello {},

We received a request to reset the password of your {} account.

Choose a new password by opening the link below (valid for 24 hours, usable once):
{}

If you did not request this, you can ignore this email.

Best regards,
The {} Team"#,
            self.full_name, self.site_name, self.reset_url, self.site_name
        )
    }
}

/// Forwards a contact-form submission to the site's contact address.
#[derive(Template)]
#[template(path = "contact_email.html")]
pub struct ContactEmailTemplate {
    pub site_name: String,
    pub sender_name: String,
    pub sender_email: String,
    pub message: String,
}

impl ContactEmailTemplate {
    pub fn subject(&self) -> String {
        format!("{} - contact request from {}", self.site_name, self.sender_name)
    }

    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    #[tracing::instrument(skip(self))]
    pub fn render_text(&self) -> String {
        format!(
            r#"New message submitted through the {} contact form.

From: {} <{}>

{}"#,
            self.site_name, self.sender_name, self.sender_email, self.message
        )
    }
}

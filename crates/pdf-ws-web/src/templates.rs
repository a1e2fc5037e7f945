//! Askama templates.
//!
//! The only HTML the service renders is the polling page handed back by a
//! non-embedded generate request. It polls the status endpoint and starts
//! the download once the job reports `READY`.

use askama::Template;
use askama_web::WebTemplate;

/// Polling page for a submitted job.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct PollingTemplate {
    pub pid: String,
    /// Workspace path, handed back as the `token` query parameter
    pub token: String,
    pub status_url: String,
    pub download_url: String,
}

impl PollingTemplate {
    pub fn new(pid: &str, token: &str) -> Self {
        let query = format!("token={}", urlencoding::encode(token));
        let pid_segment = urlencoding::encode(pid);
        Self {
            pid: pid.to_string(),
            token: token.to_string(),
            status_url: format!("/pdf/{pid_segment}/status?{query}"),
            download_url: format!("/pdf/{pid_segment}/download?{query}"),
        }
    }
}

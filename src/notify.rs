//! Run-report email notification
//!
//! Every run ends with exactly one summary email, success or failure,
//! containing the chronological run log. One message is sent per recipient;
//! a recipient that cannot be reached is logged and skipped so the report
//! still reaches the others.

use chrono::Local;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info};

use crate::config::MailConfig;
use crate::errors::NotifyResult;

/// SMTP notifier for run reports
#[derive(Debug)]
pub struct Notifier {
    sender: String,
    recipients: Vec<String>,
    smtp_host: String,
    smtp_port: u16,
    password: String,
}

impl Notifier {
    pub fn new(config: &MailConfig, password: &str) -> Self {
        Self {
            sender: config.sender.clone(),
            recipients: config.recipients.clone(),
            smtp_host: config.smtp_host.clone(),
            smtp_port: config.smtp_port,
            password: password.to_string(),
        }
    }

    /// Send the run report to every configured recipient
    ///
    /// Returns the number of recipients actually reached. Per-recipient
    /// failures are logged and swallowed; notification must never turn a
    /// successful run into a failed one.
    pub fn send_report(&self, subject: &str, status: &str, log_lines: &[String]) -> usize {
        let content = format_report(status, log_lines);

        let mut delivered = 0usize;
        for recipient in &self.recipients {
            match self.send_to(recipient, subject, &content) {
                Ok(()) => {
                    info!("Report emailed to {}", recipient);
                    delivered += 1;
                }
                Err(e) => error!("Failed to email report to {}: {}", recipient, e),
            }
        }
        delivered
    }

    fn send_to(&self, recipient: &str, subject: &str, content: &str) -> NotifyResult<()> {
        let message = Message::builder()
            .from(self.sender.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(content.to_string())?;

        let transport = SmtpTransport::starttls_relay(&self.smtp_host)?
            .port(self.smtp_port)
            .credentials(Credentials::new(
                self.sender.clone(),
                self.password.clone(),
            ))
            .build();

        transport.send(&message)?;
        Ok(())
    }
}

/// Plain-text report body: status banner followed by the chronological log
fn format_report(status: &str, log_lines: &[String]) -> String {
    let mut content = String::new();
    content.push_str(&format!(
        "REPORT AT: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    content.push_str(&"=".repeat(40));
    content.push_str(&format!("\nSTATUS: {status}\n"));
    content.push_str(&"=".repeat(40));
    content.push_str("\n\n");

    if !log_lines.is_empty() {
        content.push_str("RUN LOG:\n");
        for line in log_lines {
            content.push_str(line);
            content.push('\n');
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_contains_status_and_log() {
        let lines = vec![
            "[10:00:01] Run started".to_string(),
            "[10:00:05] Delivery complete".to_string(),
        ];
        let report = format_report("All steps completed", &lines);

        assert!(report.contains("STATUS: All steps completed"));
        assert!(report.contains("RUN LOG:"));
        assert!(report.contains("[10:00:01] Run started"));
        let status_pos = report.find("STATUS:").unwrap();
        let log_pos = report.find("[10:00:01]").unwrap();
        assert!(status_pos < log_pos);
    }

    #[test]
    fn test_report_without_log_omits_section() {
        let report = format_report("failed", &[]);
        assert!(!report.contains("RUN LOG:"));
    }

    #[test]
    fn test_bad_recipient_is_counted_out() {
        let config = MailConfig {
            sender: "robot@example.com".to_string(),
            recipients: vec!["not an address".to_string()],
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
        };
        let notifier = Notifier::new(&config, "secret");
        // Address parsing fails before any SMTP traffic
        assert_eq!(notifier.send_report("subject", "status", &[]), 0);
    }
}

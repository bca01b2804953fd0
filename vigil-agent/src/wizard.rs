//! Interactive CLI setup wizard for first-time configuration
//!
//! Runs when no config file exists (or the existing one is incomplete) and
//! blocks until the operator provides a usable configuration: device name,
//! server URL, heartbeat cadence and retry budget, with a reachability probe
//! and a confirm-before-save step.

use anyhow::{Context, Result};
use std::io::{self, Write};

use crate::config::{self, AgentConfig};

pub struct SetupWizard;

impl SetupWizard {
    /// Run the interactive setup wizard. Loops until a configuration is
    /// confirmed and saved; the caller treats this as the blocking
    /// "configuration missing" path.
    pub async fn run() -> Result<AgentConfig> {
        println!();
        println!("🖥  ======================================");
        println!("    VIGIL AGENT CONFIGURATION WIZARD");
        println!("🖥  ======================================");
        println!();

        loop {
            let config = Self::collect_config()?;

            Self::probe_server(&config.server_url).await;
            Self::display_summary(&config);

            if Self::confirm_save()? {
                config.save().await.context("Failed to save configuration")?;
                println!();
                println!("✅ Configuration saved successfully!");
                println!("🚀 The Vigil agent is now ready to start.");
                println!();
                return Ok(config);
            }

            println!("❌ Configuration discarded, starting over.");
            println!();
        }
    }

    fn collect_config() -> Result<AgentConfig> {
        println!("📋 DEVICE IDENTITY");
        println!("────────────────────────────────────────");
        println!("The device name identifies this machine on the dashboard.");
        println!("Examples: Jakarta_Office, Store_01, HQ_Manager");
        println!();

        let device_name = Self::prompt_with_default("Device name", &config::default_device_name())?;

        println!();
        println!("📡 SERVER");
        println!("────────────────────────────────────────");

        let server_url = Self::prompt_with_default(
            "Heartbeat endpoint URL",
            "http://127.0.0.1:8080/heartbeat",
        )?;

        println!();
        println!("⏱  CADENCE");
        println!("────────────────────────────────────────");

        let heartbeat_interval_secs: u64 =
            Self::prompt_with_default_parse("Heartbeat interval (seconds)", "60")?;
        let max_retries: i64 = Self::prompt_with_default_parse(
            "Failures before the persistent-failure state (0 = never)",
            "3",
        )?;

        println!();

        Ok(AgentConfig {
            server_url,
            device_name,
            heartbeat_interval_secs,
            max_retries,
        })
    }

    async fn probe_server(server_url: &str) {
        println!("🔍 Testing server connection...");
        match probe_target(server_url) {
            Some((host, port)) => match Self::test_tcp_connection(&host, port).await {
                true => println!("✅ Connection successful!"),
                false => {
                    println!("⚠️  Connection failed, but configuration will be saved.")
                }
            },
            None => println!("⚠️  Could not parse host from URL - skipping connection test."),
        }
        println!();
    }

    fn display_summary(config: &AgentConfig) {
        println!("📋 CONFIGURATION SUMMARY");
        println!("────────────────────────────────────────");
        println!("   Device name: {}", config.device_name);
        println!("   Server URL: {}", config.server_url);
        println!("   Heartbeat interval: {}s", config.heartbeat_interval_secs);
        println!(
            "   Max retries: {}",
            if config.max_retries > 0 {
                config.max_retries.to_string()
            } else {
                "unlimited (never flags persistent failure)".to_string()
            }
        );
        println!();
    }

    fn confirm_save() -> Result<bool> {
        print!("💾 Save this configuration? [Y/n]: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        Ok(input.is_empty() || input == "y" || input == "yes")
    }

    // Helper functions for user input
    fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
        print!("❓ {} [{}]: ", prompt, default);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(input.to_string())
        }
    }

    fn prompt_with_default_parse<T: std::str::FromStr>(prompt: &str, default: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        loop {
            let input = Self::prompt_with_default(prompt, default)?;
            match input.parse::<T>() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    println!("❌ Invalid input: {}. Please try again.", e);
                    continue;
                }
            }
        }
    }

    async fn test_tcp_connection(host: &str, port: u16) -> bool {
        use std::time::Duration;

        let address = format!("{}:{}", host, port);
        match tokio::time::timeout(
            Duration::from_secs(5),
            tokio::net::TcpStream::connect(&address),
        )
        .await
        {
            Ok(Ok(_)) => true,
            _ => false,
        }
    }
}

/// Extract (host, port) from an http(s) URL for the reachability probe.
/// Best effort: anything unparseable just skips the probe.
fn probe_target(url: &str) -> Option<(String, u16)> {
    let (default_port, rest) = if let Some(rest) = url.strip_prefix("https://") {
        (443, rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (80, rest)
    } else {
        return None;
    };

    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        return None;
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().ok()?;
            Some((host.to_string(), port))
        }
        None => Some((authority.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_target_parses_common_urls() {
        assert_eq!(
            probe_target("http://127.0.0.1:8080/heartbeat"),
            Some(("127.0.0.1".to_string(), 8080))
        );
        assert_eq!(
            probe_target("https://monitor.example.com/heartbeat"),
            Some(("monitor.example.com".to_string(), 443))
        );
        assert_eq!(
            probe_target("http://monitor.local"),
            Some(("monitor.local".to_string(), 80))
        );
    }

    #[test]
    fn probe_target_rejects_garbage() {
        assert_eq!(probe_target("monitor.local:8080"), None);
        assert_eq!(probe_target("http://"), None);
        assert_eq!(probe_target(""), None);
    }
}

//! Production implementations of the session's external seams, all invoked
//! as argument-vector subprocesses. No shell is involved anywhere, so SSID
//! and password content reaches the tools byte-for-byte.

use std::io::ErrorKind;
use std::process::{Command, Output, Stdio};

use log::debug;

use crate::error::{ProvisionError, Result};
use crate::session::{ConnectionManager, NetInfo, Publisher};
use crate::{
    DEFAULT_BROKER_HOST, DEFAULT_BROKER_PASSWORD, DEFAULT_BROKER_USER,
    DEFAULT_WIRELESS_INTERFACE, RESULT_TOPIC_PREFIX, STATUS_TOPIC,
};

fn run(tool: &str, args: &[&str]) -> Result<Output> {
    debug!("run: {tool} {}", args.join(" "));
    Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| match err.kind() {
            ErrorKind::NotFound => ProvisionError::MissingTool(tool.to_owned()),
            _ => ProvisionError::CommandSpawn {
                tool: tool.to_owned(),
                source: err,
            },
        })
}

fn run_checked(tool: &str, args: &[&str]) -> Result<()> {
    let output = run(tool, args)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ProvisionError::CommandFailed {
            tool: tool.to_owned(),
            status: output.status,
        })
    }
}

/// Wi-Fi actuation through NetworkManager's `nmcli`.
pub struct Nmcli;

impl ConnectionManager for Nmcli {
    fn ensure_available(&self) -> Result<()> {
        run("nmcli", &["--version"]).map(|_| ())
    }

    fn rescan(&self) -> Result<()> {
        run_checked("nmcli", &["device", "wifi", "rescan"])
    }

    fn delete_profile(&self, ssid: &str) -> Result<()> {
        run_checked("nmcli", &["connection", "delete", ssid])
    }

    fn connect(&self, ssid: &str, password: &str) -> Result<()> {
        run_checked(
            "nmcli",
            &["device", "wifi", "connect", ssid, "password", password],
        )
        .map_err(|_| ProvisionError::ConnectFailed(ssid.to_owned()))
    }
}

/// IPv4 lookup via `ip -4 -o addr show dev <iface>`.
pub struct IpCommand {
    pub iface: String,
}

impl Default for IpCommand {
    fn default() -> Self {
        Self {
            iface: DEFAULT_WIRELESS_INTERFACE.to_owned(),
        }
    }
}

impl NetInfo for IpCommand {
    fn wlan_ipv4(&self) -> Result<Option<String>> {
        let output = run("ip", &["-4", "-o", "addr", "show", "dev", &self.iface])?;
        if !output.status.success() {
            return Err(ProvisionError::CommandFailed {
                tool: "ip".to_owned(),
                status: output.status,
            });
        }
        Ok(parse_inet_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// First `inet a.b.c.d` address in one-line `ip -o` output.
fn parse_inet_output(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            if token == "inet" {
                let addr = tokens.next()?;
                let addr = addr.split('/').next().unwrap_or(addr);
                return Some(addr.to_owned());
            }
        }
    }
    None
}

/// Publishes through `mosquitto_pub`. Status codes go unauthenticated to the
/// local broker's fixed status topic; results go to the remote broker on the
/// channel-specific topic with QoS 1.
pub struct MosquittoPublisher {
    pub host: String,
    pub username: String,
    pub password: String,
    pub status_topic: String,
    pub result_topic_prefix: String,
}

impl Default for MosquittoPublisher {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_owned(),
            username: DEFAULT_BROKER_USER.to_owned(),
            password: DEFAULT_BROKER_PASSWORD.to_owned(),
            status_topic: STATUS_TOPIC.to_owned(),
            result_topic_prefix: RESULT_TOPIC_PREFIX.to_owned(),
        }
    }
}

impl Publisher for MosquittoPublisher {
    fn publish_status(&self, code: u8) -> Result<()> {
        run_checked(
            "mosquitto_pub",
            &["-t", &self.status_topic, "-m", &code.to_string()],
        )
    }

    fn publish_result(&self, channel: u16, message: &str) -> Result<()> {
        let topic = format!("{}/{}", self.result_topic_prefix, channel);
        run_checked(
            "mosquitto_pub",
            &[
                "-h",
                &self.host,
                "-u",
                &self.username,
                "-P",
                &self.password,
                "-q",
                "1",
                "-t",
                &topic,
                "-m",
                message,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inet_output_single_line() {
        let out = "3: wlan0    inet 192.168.1.17/24 brd 192.168.1.255 scope global dynamic wlan0\\       valid_lft 85957sec preferred_lft 85957sec\n";
        assert_eq!(parse_inet_output(out), Some("192.168.1.17".to_owned()));
    }

    #[test]
    fn test_parse_inet_output_takes_first_address() {
        let out = "3: wlan0    inet 10.0.0.2/16 scope global wlan0\n3: wlan0    inet 10.0.0.3/16 scope global secondary wlan0\n";
        assert_eq!(parse_inet_output(out), Some("10.0.0.2".to_owned()));
    }

    #[test]
    fn test_parse_inet_output_empty() {
        assert_eq!(parse_inet_output(""), None);
        assert_eq!(parse_inet_output("3: wlan0 state DOWN\n"), None);
    }
}

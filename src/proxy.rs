//! Egress proxy environment for the bootstrap script.

use crate::spec::EgressProxySpec;
use std::borrow::Cow;
use std::fmt::Write;

/// Characters that are safe unquoted on the right of a shell assignment.
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./:,@%+=".contains(c)
}

/// `value` as one shell word: verbatim when safe, otherwise single-quoted so
/// the shell sees exactly these bytes.
pub fn shell_word(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && value.chars().all(is_shell_safe) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
}

/// The `http://host[:port]` URL for a proxy, or `None` when no host is set.
pub fn proxy_url(spec: &EgressProxySpec) -> Option<String> {
    let host = spec.http_proxy.host.as_str();
    if host.is_empty() {
        return None;
    }

    let mut url = String::new();
    if !host.starts_with("http://") {
        url.push_str("http://");
    }
    url.push_str(host);
    if spec.http_proxy.port != 0 {
        let _ = write!(url, ":{}", spec.http_proxy.port);
    }
    Some(url)
}

/// Render the shell fragment that exports the proxy and propagates it to
/// docker, the login environment, systemd and the package manager.
///
/// Returns an empty string when there is no proxy. Every line ends in `\n`.
pub fn render_proxy_env(spec: Option<&EgressProxySpec>) -> String {
    let Some(spec) = spec else {
        return String::new();
    };
    let Some(url) = proxy_url(spec) else {
        return String::new();
    };

    let no_proxy = spec.excludes.join(",");
    let has_excludes = !no_proxy.is_empty();

    let mut out = String::new();
    let mut line = |s: &str| {
        out.push_str(s);
        out.push('\n');
    };

    let url = shell_word(&url);
    line(&format!("export http_proxy={url}"));
    line(&format!("export https_proxy={url}"));
    if has_excludes {
        line(&format!("export no_proxy={}", shell_word(&no_proxy)));
        line(r#"export NO_PROXY="${no_proxy}""#);
    }

    // /etc/environment takes bare KEY=value lines.
    for (target, export) in [("/etc/default/docker", "export "), ("/etc/environment", "")] {
        line(&format!(r#"echo "{export}http_proxy=${{http_proxy}}" >> {target}"#));
        line(&format!(r#"echo "{export}https_proxy=${{https_proxy}}" >> {target}"#));
        if has_excludes {
            line(&format!(r#"echo "{export}no_proxy=${{no_proxy}}" >> {target}"#));
            line(&format!(r#"echo "{export}NO_PROXY=${{no_proxy}}" >> {target}"#));
        }
    }

    let mut systemd_env =
        String::from(r#"echo "DefaultEnvironment=\"http_proxy=${http_proxy}\" \"https_proxy=${https_proxy}\""#);
    if has_excludes {
        systemd_env.push_str(r#" \"NO_PROXY=${no_proxy}\" \"no_proxy=${no_proxy}\""#);
    }
    systemd_env.push_str(r#"" >> /etc/systemd/system.conf"#);
    line(&systemd_env);

    line("systemctl daemon-reload");
    line("systemctl daemon-reexec");

    line("if [ -f /etc/lsb-release ] || [ -f /etc/debian_version ]; then");
    line(r#"  echo "Acquire::http::Proxy \"${http_proxy}\";" > /etc/apt/apt.conf.d/30proxy"#);
    line("elif [ -f /etc/redhat-release ]; then");
    line(r#"  echo "proxy=${http_proxy}" >> /etc/yum.conf"#);
    line("fi");

    out
}

use crate::error::{RenderError, Result};
use crate::hooks::{DirectiveKind, InstallDirective};
use regex::Regex;
use tracing::info;

const PLACEHOLDER_RE: &str = r"\{\{\s*(\w+)\s*\}\}";

/// Characters that would change the meaning of an unquoted assignment.
const SHELL_SPECIAL: &str = "'\"`$\\;&|<>()";

const HOOK_EOF: &str = "__EOF_HOOK";
const CLUSTER_SPEC_EOF: &str = "__EOF_CLUSTER_SPEC";
const IG_SPEC_EOF: &str = "__EOF_IG_SPEC";
const KUBE_ENV_EOF: &str = "__EOF_KUBE_ENV";

/// nodeup bootstrap script. `{{ Name }}` placeholders are filled at render
/// time; substituted text is never rescanned.
const TEMPLATE: &str = r##"#!/bin/bash
{{ ProxyEnv }}set -o errexit
set -o nounset
set -o pipefail

NODEUP_URL={{ NodeUpSource }}
NODEUP_HASH={{ NodeUpSourceHash }}

function ensure-install-dir() {
  INSTALL_DIR="/var/cache/kubernetes-install"
  # On ContainerOS /var/cache is noexec, install under the toolbox instead
  if [[ -d /var/lib/toolbox ]]; then
    INSTALL_DIR="/var/lib/toolbox/kubernetes-install"
  fi
  mkdir -p ${INSTALL_DIR}
  cd ${INSTALL_DIR}
}

# $1 is the file to check, $2 its expected sha256.
function validate-hash() {
  local -r file="$1"
  local -r expected="$2"
  local actual

  actual=$(sha256sum "${file}" | awk '{ print $1 }') || true
  if [[ "${actual}" != "${expected}" ]]; then
    echo "== ${file} corrupted, sha256 ${actual} doesn't match expected ${expected} =="
    return 1
  fi
}

function download-release() {
  echo "Downloading nodeup (${NODEUP_URL})"
  rm -f nodeup
  if ! curl -f --ipv4 -Lo nodeup --connect-timeout 20 --retry 6 --retry-delay 10 "${NODEUP_URL}"; then
    echo "== Failed to download ${NODEUP_URL} =="
    exit 1
  fi
  if ! validate-hash nodeup "${NODEUP_HASH}"; then
    echo "== Refusing to run unverified nodeup =="
    exit 1
  fi
  echo "== Downloaded ${NODEUP_URL} (SHA256 = ${NODEUP_HASH}) =="

  chmod +x nodeup

  echo "Running nodeup"
  ( cd ${INSTALL_DIR}; ./nodeup --install-systemd-unit --conf=${INSTALL_DIR}/kube_env.yaml --v=8 )
}

####################################################################################

/bin/systemd-machine-id-setup || echo "failed to set up ensure machine-id configured"

echo "== nodeup node config starting =="
{{ Hooks }}ensure-install-dir

cat > cluster_spec.yaml << '__EOF_CLUSTER_SPEC'
{{ ClusterSpec }}__EOF_CLUSTER_SPEC

cat > ig_spec.yaml << '__EOF_IG_SPEC'
{{ IGSpec }}__EOF_IG_SPEC

cat > kube_env.yaml << '__EOF_KUBE_ENV'
{{ KubeEnv }}__EOF_KUBE_ENV

download-release
echo "== nodeup node config done =="
"##;

/// Where and how to fetch the node agent, plus everything it reads on start.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentBootstrap {
    pub source_url: String,
    pub source_hash: String,
    /// Written verbatim to kube_env.yaml.
    pub config: String,
    /// Written verbatim to cluster_spec.yaml.
    pub cluster_spec: String,
    /// Written verbatim to ig_spec.yaml.
    pub ig_spec: String,
}

/// A bootstrap script that has been assembled but not yet rendered.
///
/// Building one never fails; [`RenderedScript::render`] does the substitution
/// and all validation, and yields either the whole script or an error.
#[derive(Debug, Clone)]
pub struct RenderedScript {
    proxy_env: String,
    hooks: Vec<InstallDirective>,
    agent: AgentBootstrap,
}

pub fn compose(
    proxy_env: String,
    hooks: Vec<InstallDirective>,
    agent: AgentBootstrap,
) -> RenderedScript {
    RenderedScript {
        proxy_env,
        hooks,
        agent,
    }
}

impl RenderedScript {
    pub fn hooks(&self) -> &[InstallDirective] {
        &self.hooks
    }

    pub fn agent(&self) -> &AgentBootstrap {
        &self.agent
    }

    /// Materialize the script text.
    pub fn render(&self) -> Result<String> {
        let source = single_token("nodeup source", &self.agent.source_url)?;
        let hash = single_token("nodeup source hash", &self.agent.source_hash)?;
        let hooks = render_hooks(&self.hooks)?;
        let cluster_spec =
            heredoc_body("cluster spec", CLUSTER_SPEC_EOF, &self.agent.cluster_spec)?;
        let ig_spec = heredoc_body("instance group spec", IG_SPEC_EOF, &self.agent.ig_spec)?;
        let kube_env = heredoc_body("nodeup config", KUBE_ENV_EOF, &self.agent.config)?;

        let script = substitute(TEMPLATE, |key| match key {
            "ProxyEnv" => Some(self.proxy_env.as_str()),
            "NodeUpSource" => Some(source),
            "NodeUpSourceHash" => Some(hash),
            "Hooks" => Some(hooks.as_str()),
            "ClusterSpec" => Some(cluster_spec.as_str()),
            "IGSpec" => Some(ig_spec.as_str()),
            "KubeEnv" => Some(kube_env.as_str()),
            _ => None,
        })?;

        info!(bytes = script.len(), hooks = self.hooks.len(), "rendered bootstrap script");
        Ok(script)
    }
}

fn single_token<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(RenderError::Template(format!("{what} is empty")));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || SHELL_SPECIAL.contains(c))
    {
        return Err(RenderError::Template(format!(
            "{what} {value:?} must be a single shell word"
        )));
    }
    Ok(value)
}

/// `body` with a guaranteed trailing newline, checked against `eof`.
fn heredoc_body(what: &str, eof: &str, body: &str) -> Result<String> {
    if body.lines().any(|line| line == eof) {
        return Err(RenderError::Template(format!(
            "{what} contains the heredoc terminator {eof}"
        )));
    }
    let mut out = body.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Unit files first, then one reload, then start/disable in hook order.
fn render_hooks(hooks: &[InstallDirective]) -> Result<String> {
    if hooks.is_empty() {
        return Ok(String::new());
    }

    let mut out = String::new();
    let mut installed = false;
    for hook in hooks {
        if let Some(unit) = hook.unit_file() {
            let body = heredoc_body(&format!("hook {}", hook.name), HOOK_EOF, unit)?;
            out.push_str(&format!(
                "cat > /etc/systemd/system/{} << '{HOOK_EOF}'\n",
                hook.name
            ));
            out.push_str(&body);
            out.push_str(HOOK_EOF);
            out.push('\n');
            installed = true;
        }
    }
    if installed {
        out.push_str("systemctl daemon-reload\n");
    }
    for hook in hooks {
        match hook.kind {
            DirectiveKind::Disable => {
                out.push_str(&format!("systemctl disable --now {} || true\n", hook.name));
            }
            DirectiveKind::Unit { .. } | DirectiveKind::Container { .. } => {
                out.push_str(&format!("systemctl start --no-block {}\n", hook.name));
            }
        }
    }
    out.push('\n');
    Ok(out)
}

/// Single pass placeholder substitution; unknown names are an error.
fn substitute<'a, F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let re = Regex::new(PLACEHOLDER_RE)?;
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in re.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = lookup(name.as_str()).ok_or_else(|| {
            RenderError::Template(format!("no value for placeholder {}", name.as_str()))
        })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

//! Hook compilation: merge cluster and instance group hooks, filter them by
//! role, and turn each survivor into an install directive.

use crate::error::{RenderError, Result};
use crate::hooks::unit::{CommandEscaper, UnitManifest};
use crate::spec::{ExecContainerAction, HookAction, HookSpec, Role, applies};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Characters systemd accepts in a unit name.
const UNIT_NAME_RE: &str = r"^[A-Za-z0-9:_.@-]+$";

/// Fixed prefix of every container hook's `docker run`.
const DOCKER_RUN: &[&str] = &[
    "/usr/bin/docker",
    "run",
    "-v",
    "/:/rootfs/",
    "-v",
    "/var/run/dbus:/var/run/dbus",
    "-v",
    "/run/systemd:/run/systemd",
    "--net=host",
    "--privileged",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookScope {
    Cluster,
    InstanceGroup,
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookScope::Cluster => f.write_str("cluster"),
            HookScope::InstanceGroup => f.write_str("instance group"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveKind {
    /// A unit whose `[Service]` body came from the hook manifest.
    Unit { manifest: String },
    /// A oneshot unit that pulls and runs a container.
    Container {
        image: String,
        argv: Vec<String>,
        manifest: String,
    },
    /// Stop and disable an existing unit.
    Disable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallDirective {
    /// systemd unit name, always ending in `.service`.
    pub name: String,
    pub scope: HookScope,
    pub kind: DirectiveKind,
}

impl InstallDirective {
    /// Unit file text to install, if this directive installs one.
    pub fn unit_file(&self) -> Option<&str> {
        match &self.kind {
            DirectiveKind::Unit { manifest } | DirectiveKind::Container { manifest, .. } => {
                Some(manifest)
            }
            DirectiveKind::Disable => None,
        }
    }
}

/// Compile cluster hooks, then instance group hooks, for `target`.
///
/// Declaration order is kept within each scope. Hooks that do not apply to
/// the role are dropped before validation; a surviving malformed hook fails
/// the whole compilation.
pub fn compile_hooks(
    cluster_hooks: &[HookSpec],
    group_hooks: &[HookSpec],
    target: Role,
) -> Result<Vec<InstallDirective>> {
    let escaper = CommandEscaper::new()?;
    let valid_name = Regex::new(UNIT_NAME_RE)?;
    let mut names = BTreeSet::new();
    let mut out = Vec::new();

    let scopes = [
        (HookScope::Cluster, cluster_hooks),
        (HookScope::InstanceGroup, group_hooks),
    ];
    for (scope, hooks) in scopes {
        for (index, hook) in hooks.iter().enumerate() {
            let name = unit_name(hook, scope, index);

            if !applies(&hook.roles, target) {
                debug!(hook = %name, %scope, role = %target, "hook does not apply to role");
                continue;
            }

            let action = hook.action().map_err(|reason| RenderError::MalformedHook {
                hook: describe(hook, scope, index),
                reason,
            })?;

            if !valid_name.is_match(&name) {
                return Err(RenderError::MalformedHook {
                    hook: describe(hook, scope, index),
                    reason: format!("{name:?} is not a valid unit name"),
                });
            }

            check_single_line(hook, action).map_err(|reason| RenderError::MalformedHook {
                hook: describe(hook, scope, index),
                reason,
            })?;

            if !names.insert(name.clone()) {
                return Err(RenderError::DuplicateHook { name });
            }

            let kind = match action {
                HookAction::Disable => DirectiveKind::Disable,
                HookAction::Manifest(body) => DirectiveKind::Unit {
                    manifest: manifest_unit(&name, hook, body),
                },
                HookAction::Container(exec) => {
                    let argv = docker_argv(exec);
                    DirectiveKind::Container {
                        image: exec.image.clone(),
                        manifest: container_unit(&name, hook, exec, &argv, &escaper),
                        argv,
                    }
                }
            };

            debug!(hook = %name, %scope, role = %target, "compiled hook");
            out.push(InstallDirective { name, scope, kind });
        }
    }

    Ok(out)
}

/// The unit name for a hook; unnamed hooks get a positional name.
fn unit_name(hook: &HookSpec, scope: HookScope, index: usize) -> String {
    let mut name = match hook.name.as_deref().filter(|n| !n.is_empty()) {
        Some(n) => n.to_string(),
        None => match scope {
            HookScope::Cluster => format!("hook-{index}"),
            HookScope::InstanceGroup => format!("hook-{index}-ig"),
        },
    };
    if !name.ends_with(".service") {
        name.push_str(".service");
    }
    name
}

fn describe(hook: &HookSpec, scope: HookScope, index: usize) -> String {
    match hook.name.as_deref().filter(|n| !n.is_empty()) {
        Some(n) => format!("{n:?}"),
        None => format!("{scope} hook #{index}"),
    }
}

/// Values copied into `Key=value` unit lines must not break the line.
fn check_single_line(hook: &HookSpec, action: HookAction<'_>) -> std::result::Result<(), String> {
    let mut fields: Vec<(&str, &str)> = Vec::new();
    fields.extend(hook.requires.iter().map(|v| ("requires", v.as_str())));
    fields.extend(hook.before.iter().map(|v| ("before", v.as_str())));
    if let HookAction::Container(exec) = action {
        fields.push(("execContainer.image", exec.image.as_str()));
        fields.extend(
            exec.environment
                .keys()
                .map(|k| ("execContainer.environment", k.as_str())),
        );
    }

    match fields
        .into_iter()
        .find(|(_, value)| value.chars().any(char::is_control))
    {
        Some((field, value)) => Err(format!(
            "{field} entry {value:?} contains a control character"
        )),
        None => Ok(()),
    }
}

fn unit_header(name: &str, hook: &HookSpec) -> UnitManifest {
    let mut unit = UnitManifest::new();
    unit.set("Unit", "Description", format!("Node Hook {name}"));
    for dep in &hook.requires {
        unit.set("Unit", "Requires", dep.as_str());
    }
    unit
}

fn add_before(unit: &mut UnitManifest, hook: &HookSpec) {
    for target in &hook.before {
        unit.set("Unit", "Before", target.as_str());
    }
}

fn manifest_unit(name: &str, hook: &HookSpec, body: &str) -> String {
    let mut unit = unit_header(name, hook);
    add_before(&mut unit, hook);
    unit.set_raw("Service", body);
    unit.render()
}

fn docker_argv(exec: &ExecContainerAction) -> Vec<String> {
    let mut argv: Vec<String> = DOCKER_RUN.iter().map(|s| s.to_string()).collect();
    for (key, value) in &exec.environment {
        argv.push("-e".to_string());
        argv.push(format!("{key}={value}"));
    }
    argv.push(exec.image.clone());
    argv.extend(exec.command.iter().cloned());
    argv
}

fn container_unit(
    name: &str,
    hook: &HookSpec,
    exec: &ExecContainerAction,
    argv: &[String],
    escaper: &CommandEscaper,
) -> String {
    let mut unit = unit_header(name, hook);
    unit.set("Unit", "Requires", "docker.service");
    add_before(&mut unit, hook);
    unit.set(
        "Service",
        "ExecStartPre",
        escaper.escape_command(&["/usr/bin/docker", "pull", exec.image.as_str()]),
    );
    unit.set("Service", "ExecStart", escaper.escape_command(argv));
    unit.set("Service", "Type", "oneshot");
    unit.set("Install", "WantedBy", "multi-user.target");
    unit.render()
}

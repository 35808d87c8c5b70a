//! End-to-end rendering against golden scripts in tests/data.

use nodeup_script::spec::{
    ClusterSpec, EgressProxySpec, ExecContainerAction, HookSpec, HttpProxy, InstanceGroup,
    InstanceGroupSpec, Role,
};
use nodeup_script::{BootstrapScript, NodeAgentConfig, RenderError};
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_yaml::Value;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TestNodeupConfig {
    cluster_name: String,
}

fn build_config(group: &InstanceGroup) -> anyhow::Result<NodeAgentConfig> {
    let mut config = NodeAgentConfig::new(&TestNodeupConfig {
        cluster_name: "minimal.example.com".to_string(),
    })?;
    config.insert("InstanceGroupName", group.name.as_str());
    config.insert("InstanceGroupRole", group.role().as_str());
    Ok(config)
}

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn make_test_cluster(hook_roles: &[Role]) -> ClusterSpec {
    ClusterSpec {
        docker: Some(yaml("logLevel: INFO")),
        kube_proxy: Some(yaml(
            "cpuRequest: 30m\nfeatureGates:\n  AdvancedAuditing: \"true\"",
        )),
        kubelet: Some(yaml("kubeconfigPath: /etc/kubernetes/config.txt")),
        master_kubelet: Some(yaml("kubeconfigPath: /etc/kubernetes/config.cfg")),
        egress_proxy: Some(EgressProxySpec {
            http_proxy: HttpProxy {
                host: "example.com".to_string(),
                port: 80,
            },
            excludes: vec![],
        }),
        hooks: vec![HookSpec {
            exec_container: Some(ExecContainerAction {
                image: "busybox".to_string(),
                command: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "chroot /rootfs apt-get update && chroot /rootfs apt-get install -y ceph-common"
                        .to_string(),
                ],
                ..Default::default()
            }),
            roles: hook_roles.to_vec(),
            ..Default::default()
        }],
    }
}

fn make_test_instance_group(role: Role, hook_roles: &[Role]) -> InstanceGroup {
    let name = match role {
        Role::Master => "master-us-test-1a",
        _ => "nodes",
    };
    InstanceGroup {
        name: name.to_string(),
        spec: InstanceGroupSpec {
            role,
            kubelet: Some(yaml("kubeconfigPath: /etc/kubernetes/igconfig.txt")),
            node_labels: [
                ("labelname".to_string(), "labelvalue".to_string()),
                ("label2".to_string(), "value2".to_string()),
            ]
            .into(),
            taints: vec![
                "key1=value1:NoSchedule".to_string(),
                "key2=value2:NoExecute".to_string(),
            ],
            hooks: vec![
                HookSpec {
                    name: Some("disable-update-engine.service".to_string()),
                    before: vec![
                        "update-engine.service".to_string(),
                        "kubelet.service".to_string(),
                    ],
                    manifest: Some(
                        "Type=oneshot\nExecStart=/usr/bin/systemctl stop update-engine.service"
                            .to_string(),
                    ),
                    roles: hook_roles.to_vec(),
                    ..Default::default()
                },
                HookSpec {
                    name: Some("apply-to-all.service".to_string()),
                    manifest: Some(
                        "Type=oneshot\nExecStart=/usr/bin/systemctl start apply-to-all.service"
                            .to_string(),
                    ),
                    ..Default::default()
                },
            ],
        },
    }
}

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("reading fixture {}: {e}", path.display()))
}

fn render(role: Role, hook_roles: &[Role]) -> String {
    let cluster = make_test_cluster(hook_roles);
    let group = make_test_instance_group(role, hook_roles);
    let bs = BootstrapScript::new("NUSource", "NUSHash", build_config);

    bs.resource_node_up(&group, &cluster)
        .expect("create nodeup resource")
        .expect("non-bastion groups get a script")
        .render()
        .expect("render nodeup resource")
}

#[test]
fn bootstrap_user_data_matches_fixtures() {
    // Bastion scoping applies to neither Master nor Node.
    let cases: Vec<(Role, Vec<Role>, &str)> = vec![
        (Role::Master, vec![Role::Bastion], "bootstrapscript_0.txt"),
        (Role::Master, vec![Role::Node], "bootstrapscript_0.txt"),
        (Role::Master, vec![Role::Master], "bootstrapscript_1.txt"),
        (Role::Master, vec![Role::Master, Role::Node], "bootstrapscript_2.txt"),
        (Role::Node, vec![Role::Bastion], "bootstrapscript_3.txt"),
        (Role::Node, vec![Role::Node], "bootstrapscript_4.txt"),
        (Role::Node, vec![Role::Master], "bootstrapscript_3.txt"),
        (Role::Node, vec![Role::Master, Role::Node], "bootstrapscript_5.txt"),
    ];

    for (i, (role, hook_roles, expected)) in cases.iter().enumerate() {
        let actual = render(*role, hook_roles);
        assert_eq!(
            fixture(expected),
            actual,
            "case {i}: {role} with hook roles {hook_roles:?}"
        );
    }
}

#[test]
fn unscoped_hooks_render_for_every_role() {
    for role in [Role::Master, Role::Node] {
        let script = render(role, &[]);
        assert!(script.contains("cat > /etc/systemd/system/hook-0.service"));
        assert!(script.contains("cat > /etc/systemd/system/disable-update-engine.service"));
        assert!(script.contains("'__EOF_CLUSTER_SPEC'\n"));
        assert!(script.contains("hooks:\n- execContainer:\n    image: busybox\n"));
        assert!(!script.contains("roles:"));
    }
}

#[test]
fn embedded_specs_echo_hook_roles() {
    let master_only = render(Role::Master, &[Role::Master]);
    let both = render(Role::Master, &[Role::Master, Role::Node]);
    assert!(master_only.contains("- roles:\n  - Master\n  execContainer:\n"));
    assert!(both.contains("- roles:\n  - Master\n  - Node\n  execContainer:\n"));
    assert!(master_only.contains("masterKubelet:\n"));
    assert!(!render(Role::Node, &[]).contains("masterKubelet:"));
}

#[test]
fn rendering_is_deterministic() {
    let first = render(Role::Node, &[Role::Master, Role::Node]);
    let second = render(Role::Node, &[Role::Master, Role::Node]);
    assert_eq!(first, second);
}

#[test]
fn proxy_excludes_show_up_verbatim() {
    let mut cluster = make_test_cluster(&[]);
    if let Some(proxy) = cluster.egress_proxy.as_mut() {
        proxy.excludes = vec!["www.google.com".to_string(), "www.kubernetes.io".to_string()];
    }
    let group = make_test_instance_group(Role::Node, &[]);
    let script = BootstrapScript::new("NUSource", "NUSHash", build_config)
        .resource_node_up(&group, &cluster)
        .unwrap()
        .unwrap()
        .render()
        .unwrap();

    assert!(script.starts_with("#!/bin/bash\nexport http_proxy=http://example.com:80\n"));
    assert!(script.contains("export no_proxy=www.google.com,www.kubernetes.io\n"));
}

#[test]
fn proxy_excludes_with_spaces_stay_one_assignment() {
    let mut cluster = make_test_cluster(&[]);
    if let Some(proxy) = cluster.egress_proxy.as_mut() {
        proxy.excludes = vec!["a.local".to_string(), " b.local".to_string()];
    }
    let group = make_test_instance_group(Role::Node, &[]);
    let script = BootstrapScript::new("NUSource", "NUSHash", build_config)
        .resource_node_up(&group, &cluster)
        .unwrap()
        .unwrap()
        .render()
        .unwrap();

    assert!(script.contains("export no_proxy='a.local, b.local'\n"));
}

#[test]
fn no_proxy_means_no_proxy_block() {
    let mut cluster = make_test_cluster(&[]);
    cluster.egress_proxy = None;
    let group = make_test_instance_group(Role::Master, &[]);
    let script = BootstrapScript::new("NUSource", "NUSHash", build_config)
        .resource_node_up(&group, &cluster)
        .unwrap()
        .unwrap()
        .render()
        .unwrap();

    assert!(script.starts_with("#!/bin/bash\nset -o errexit\n"));
    assert!(!script.contains("http_proxy"));
}

#[test]
fn malformed_cluster_hook_fails_the_render() {
    let mut cluster = make_test_cluster(&[]);
    cluster.hooks.push(HookSpec {
        name: Some("empty".to_string()),
        ..Default::default()
    });
    let group = make_test_instance_group(Role::Node, &[]);

    let err = BootstrapScript::new("NUSource", "NUSHash", build_config)
        .resource_node_up(&group, &cluster)
        .unwrap_err();
    assert!(
        matches!(&err, RenderError::MalformedHook { hook, .. } if hook == "\"empty\""),
        "{err}"
    );
}

#[test]
fn documents_load_from_yaml() {
    let cluster: ClusterSpec = serde_yaml::from_str(
        r#"
docker:
  logLevel: INFO
kubeProxy:
  cpuRequest: 30m
  featureGates:
    AdvancedAuditing: "true"
kubelet:
  kubeconfigPath: /etc/kubernetes/config.txt
masterKubelet:
  kubeconfigPath: /etc/kubernetes/config.cfg
egressProxy:
  httpProxy:
    host: example.com
    port: 80
hooks:
- roles: [Master, Node]
  execContainer:
    image: busybox
    command:
    - sh
    - -c
    - chroot /rootfs apt-get update && chroot /rootfs apt-get install -y ceph-common
"#,
    )
    .unwrap();
    let group = make_test_instance_group(Role::Node, &[Role::Master, Role::Node]);

    let script = BootstrapScript::new("NUSource", "NUSHash", build_config)
        .resource_node_up(&group, &cluster)
        .unwrap()
        .unwrap()
        .render()
        .unwrap();
    assert_eq!(script, fixture("bootstrapscript_5.txt"));
}

use trellis_core::descriptor::{
    ArtifactDescriptor, ConfigurationDescriptor, ModuleDescriptor, Visibility,
};
use trellis_core::module::ModuleRevisionId;

fn module(coordinate: &str) -> ModuleDescriptor {
    ModuleDescriptor::new(ModuleRevisionId::parse(coordinate).unwrap())
}

#[test]
fn implicit_default_configuration() {
    let descriptor = module("org:lib:1.0");
    assert!(descriptor.has_configuration("default"));
    assert!(!descriptor.has_configuration("compile"));
    assert_eq!(descriptor.public_configuration_names(), vec!["default"]);
}

#[test]
fn implicit_artifact_uses_module_name() {
    let descriptor = module("org:lib:1.0");
    let artifacts = descriptor.artifacts_for("default");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].name, "lib");
    assert_eq!(artifacts[0].file_name("1.0"), "lib-1.0.jar");
}

#[test]
fn public_configurations_skip_private() {
    let descriptor = module("org:lib:1.0")
        .with_configuration(ConfigurationDescriptor::new("compile"))
        .with_configuration(ConfigurationDescriptor::new("runtime").extends(["compile"]))
        .with_configuration(ConfigurationDescriptor::new("internal").private());
    assert_eq!(
        descriptor.public_configuration_names(),
        vec!["compile", "runtime"]
    );
    assert_eq!(descriptor.extends_of("runtime").unwrap(), ["compile"]);
    assert!(descriptor.extends_of("default").is_none());
}

#[test]
fn artifacts_filtered_by_configuration() {
    let descriptor = module("org:lib:1.0")
        .with_configuration(ConfigurationDescriptor::new("compile"))
        .with_configuration(ConfigurationDescriptor::new("docs"))
        .with_artifact(ArtifactDescriptor::new("lib").in_configurations(["compile"]))
        .with_artifact(
            ArtifactDescriptor::new("lib")
                .with_classifier("javadoc")
                .in_configurations(["docs"]),
        );
    let compile = descriptor.artifacts_for("compile");
    assert_eq!(compile.len(), 1);
    assert!(compile[0].classifier.is_none());
    let docs = descriptor.artifacts_for("docs");
    assert_eq!(docs[0].file_name("1.0"), "lib-1.0-javadoc.jar");
}

#[test]
fn real_configurations_expand_wildcard_and_fallback() {
    let descriptor = module("org:lib:1.0")
        .with_configuration(ConfigurationDescriptor::new("compile"))
        .with_configuration(ConfigurationDescriptor::new("runtime").extends(["compile"]))
        .with_configuration(ConfigurationDescriptor::new("test").private());
    assert_eq!(
        descriptor.real_configurations("*"),
        vec!["compile", "runtime"]
    );
    assert_eq!(descriptor.real_configurations("runtime(compile)"), vec!["runtime"]);
    assert_eq!(descriptor.real_configurations("master(compile)"), vec!["compile"]);
    assert_eq!(descriptor.real_configurations("master(*)"), vec!["compile", "runtime"]);
    assert_eq!(descriptor.real_configurations("missing"), vec!["missing"]);
}

#[test]
fn parse_toml_descriptor() {
    let toml = r#"
module = "org.example:app:1.0"

[[configurations]]
name = "compile"

[[configurations]]
name = "runtime"
extends = ["compile"]

[[configurations]]
name = "test"
extends = ["runtime"]
visibility = "private"

[[artifacts]]
name = "app"
conf = ["compile"]

[[dependencies]]
module = "org.example:lib:1.+"
conf = "compile->default"

[[dependencies]]
module = "org.example:tool:2.0"
conf = "test->*"
transitive = false
include-default-artifacts = true

[[dependencies.exclude]]
organization = "org.bad"

[[dependencies.artifacts]]
name = "tool"
classifier = "tests"
"#;
    let descriptor = ModuleDescriptor::parse_toml(toml).unwrap();
    assert_eq!(descriptor.id.to_string(), "org.example:app:1.0");
    assert_eq!(descriptor.configurations.len(), 3);
    assert_eq!(descriptor.configurations[2].visibility, Visibility::Private);
    assert_eq!(descriptor.dependencies.len(), 2);

    let lib = &descriptor.dependencies[0];
    assert_eq!(lib.requested.revision, "1.+");
    assert!(lib.transitive);

    let tool = &descriptor.dependencies[1];
    assert!(!tool.transitive);
    assert!(tool.include_default_artifacts);
    assert_eq!(tool.excludes[0].organization, "org.bad");
    assert_eq!(tool.excludes[0].module, "*");
    assert_eq!(tool.artifacts[0].classifier.as_deref(), Some("tests"));
    assert_eq!(tool.artifacts[0].kind, "jar");
}

#[test]
fn parse_toml_rejects_bad_coordinate() {
    assert!(ModuleDescriptor::parse_toml("module = \"not-a-coordinate\"").is_err());
}

#[test]
fn toml_roundtrip_preserves_dependencies() {
    let descriptor = ModuleDescriptor::parse_toml(
        r#"
module = "org.example:app:1.0"

[[dependencies]]
module = "org.example:lib:2.0"
conf = "compile->runtime,master"
"#,
    )
    .unwrap();
    let written = descriptor.to_toml().unwrap();
    let reparsed = ModuleDescriptor::parse_toml(&written).unwrap();
    assert_eq!(reparsed, descriptor);
}

#[test]
fn from_path_reads_descriptor_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("lib.toml");
    std::fs::write(&path, "module = \"org:lib:2.0\"\n").unwrap();

    let descriptor = ModuleDescriptor::from_path(&path).unwrap();
    assert_eq!(descriptor.id, ModuleRevisionId::parse("org:lib:2.0").unwrap());
    assert!(ModuleDescriptor::from_path(&tmp.path().join("absent.toml")).is_err());
}

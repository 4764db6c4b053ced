use std::fs;
use std::path::Path;

use assert_matches::assert_matches;
use tempfile::TempDir;
use xlite_codegen::{CodegenConfig, Error, Generator};
use xlite_launcher::{CommandSpec, SystemCommandRunner};

// Stands in for protoc: writes Go files below the package path of the schema,
// the way `paths=source_relative` does.
const FAKE_PROTOC: &str = r#"
if [ "$1" = "--version" ]; then echo "libprotoc 25.1"; exit 0; fi
out=""
schema=""
for arg in "$@"; do
  case "$arg" in
    --go_out=paths=source_relative:*) out="${arg#--go_out=paths=source_relative:}" ;;
  esac
  schema="$arg"
done
rel="${schema#*/proto/}"
dir="$out/$(dirname "$rel")"
base="$(basename "$rel" .proto)"
mkdir -p "$dir"
echo "package pb" > "$dir/$base.pb.go"
echo "package pb" > "$dir/${base}_grpc.pb.go"
"#;

const BROKEN_PROTOC: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --go_out=paths=source_relative:*) out="${arg#--go_out=paths=source_relative:}" ;;
  esac
done
echo "partial" > "$out/partial.pb.go"
echo "vectorxlite.proto:3:1: Expected top-level statement" >&2
exit 1
"#;

fn workspace(script: &str) -> (TempDir, CodegenConfig) {
    let root = tempfile::tempdir().unwrap();
    for schema in ["vectorxlite/v1/vectorxlite.proto", "cluster/v1/cluster.proto"] {
        let path = root.path().join("proto").join(schema);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "syntax = \"proto3\";\n").unwrap();
    }

    let script_path = root.path().join("protoc.sh");
    fs::write(&script_path, script).unwrap();

    let mut config = CodegenConfig::from_root(root.path());
    config.protoc = CommandSpec::new("sh", [script_path]);

    (root, config)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_generates_flat_output_for_both_schemas() {
    let (root, config) = workspace(FAKE_PROTOC);
    let generator = Generator::new(config, SystemCommandRunner);

    assert_eq!(generator.check_protoc().await.unwrap(), "libprotoc 25.1");

    let outcomes = generator.generate_all().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let storage_pb = root.path().join("standalone/clients/go/pb");
    assert_eq!(
        file_names(&storage_pb),
        vec!["vectorxlite.pb.go", "vectorxlite_grpc.pb.go"]
    );
    assert_eq!(
        file_names(&root.path().join("distributed/cluster/pkg/pb")),
        vec!["cluster.pb.go", "cluster_grpc.pb.go"]
    );

    // Staging directories are gone.
    assert_eq!(file_names(&root.path().join("standalone/clients/go")), vec!["pb"]);

    // Reruns overwrite in place.
    let again = generator.generate_all().await;
    assert!(again.iter().all(|o| o.result.is_ok()));
    assert_eq!(file_names(&storage_pb).len(), 2);
}

#[tokio::test]
async fn test_compiler_failure_leaves_no_output() {
    let (root, config) = workspace(BROKEN_PROTOC);
    let job = config.jobs[0].clone();
    let generator = Generator::new(config, SystemCommandRunner);

    let result = generator.generate(&job).await;
    assert_matches!(
        result,
        Err(Error::Compiler { code: Some(1), ref diagnostic, .. }) if diagnostic.contains("Expected top-level statement")
    );

    assert!(!job.output_dir.exists());
    assert!(file_names(&root.path().join("standalone/clients/go")).is_empty());
}

#[tokio::test]
async fn test_missing_schema() {
    let (root, config) = workspace(FAKE_PROTOC);
    fs::remove_file(root.path().join("proto/cluster/v1/cluster.proto")).unwrap();
    let generator = Generator::new(config, SystemCommandRunner);

    let outcomes = generator.generate_all().await;

    assert!(outcomes[0].result.is_ok());
    assert_matches!(&outcomes[1].result, Err(Error::MissingSchema(path)) if path.ends_with("cluster/v1/cluster.proto"));
}

#[tokio::test]
async fn test_missing_protoc() {
    let (_root, mut config) = workspace(FAKE_PROTOC);
    config.protoc = CommandSpec::new("xlite-no-such-protoc", Vec::<String>::new());
    let generator = Generator::new(config, SystemCommandRunner);

    assert_matches!(generator.check_protoc().await, Err(Error::ProtocNotFound(_)));
}

//! Go bindings generation for the VectorXLite protocol schemas.
//!
//! `protoc` writes its output below a directory mirroring the schema's package
//! path (`vectorxlite/v1/...`). The generator compiles into a staging directory
//! next to the target and moves the files flat into it, so a failed run never
//! leaves partial output behind.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};
use xlite_launcher::{CommandRunner, CommandSpec};

/// One schema and where its bindings go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtoJob {
    /// Name used in logs.
    pub name: String,

    /// Directory receiving the generated files.
    pub output_dir: PathBuf,

    /// Schema path, relative to the proto root.
    pub schema: PathBuf,
}

/// Code generation settings.
#[derive(Clone, Debug)]
pub struct CodegenConfig {
    /// Schemas to compile, in order.
    pub jobs: Vec<ProtoJob>,

    /// Directory passed as `--proto_path`.
    pub proto_root: PathBuf,

    /// Compiler invocation, without per-job arguments.
    pub protoc: CommandSpec,

    /// Directory the compiler runs in.
    pub root_dir: PathBuf,
}

impl CodegenConfig {
    /// Storage and cluster bindings under a repository root.
    pub fn from_root(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();

        Self {
            jobs: vec![
                ProtoJob {
                    name: "VectorXLite".to_string(),
                    output_dir: root_dir.join("standalone/clients/go/pb"),
                    schema: PathBuf::from("vectorxlite/v1/vectorxlite.proto"),
                },
                ProtoJob {
                    name: "Cluster".to_string(),
                    output_dir: root_dir.join("distributed/cluster/pkg/pb"),
                    schema: PathBuf::from("cluster/v1/cluster.proto"),
                },
            ],
            proto_root: root_dir.join("proto"),
            protoc: CommandSpec::new("protoc", Vec::<String>::new()),
            root_dir,
        }
    }
}

/// Outcome of one job.
#[derive(Debug)]
pub struct JobOutcome {
    /// The job.
    pub job: ProtoJob,

    /// Generated file paths, or why generation failed.
    pub result: Result<Vec<PathBuf>>,
}

/// Runs `protoc` for each configured job.
#[derive(Clone, Debug)]
pub struct Generator<C: CommandRunner> {
    config: CodegenConfig,
    runner: C,
}

impl<C: CommandRunner> Generator<C> {
    /// Creates a new `Generator`.
    pub const fn new(config: CodegenConfig, runner: C) -> Self {
        Self { config, runner }
    }

    /// Verifies the compiler is installed and returns its version string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocNotFound`] if it is not on the `PATH` or does not
    /// answer `--version`.
    pub async fn check_protoc(&self) -> Result<String> {
        let program = &self.config.protoc.program;
        which::which(program)
            .map_err(|e| Error::ProtocNotFound(format!("{}: {e}", program.display())))?;

        let version = self.config.protoc.clone().with_args(["--version"]);
        let output = self.runner.run(&version).await?;
        if !output.is_success() {
            return Err(Error::ProtocNotFound(output.diagnostic().to_string()));
        }

        Ok(output.stdout.trim().to_string())
    }

    /// Runs every job, continuing past failures.
    pub async fn generate_all(&self) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(self.config.jobs.len());

        for job in &self.config.jobs {
            info!("Generating {} protos", job.name);
            let result = self.generate(job).await;
            match &result {
                Ok(files) => info!(
                    "Generated {} file(s) in {}",
                    files.len(),
                    job.output_dir.display()
                ),
                Err(e) => warn!("Generating {} protos failed: {}", job.name, e),
            }
            outcomes.push(JobOutcome {
                job: job.clone(),
                result,
            });
        }

        outcomes
    }

    /// Compiles one schema and moves the output flat into the job's directory.
    ///
    /// Existing files of the same name are overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is missing, the compiler fails, or the
    /// output cannot be moved into place.
    pub async fn generate(&self, job: &ProtoJob) -> Result<Vec<PathBuf>> {
        let schema = self.config.proto_root.join(&job.schema);
        if !fs::try_exists(&schema)
            .await
            .map_err(|e| Error::Io("failed to check schema", e))?
        {
            return Err(Error::MissingSchema(schema));
        }

        let staging_parent = job
            .output_dir
            .parent()
            .unwrap_or(self.config.root_dir.as_path())
            .to_path_buf();
        fs::create_dir_all(&staging_parent)
            .await
            .map_err(|e| Error::Io("failed to create output parent", e))?;
        let staging = tempfile::Builder::new()
            .prefix(".codegen-")
            .tempdir_in(&staging_parent)
            .map_err(|e| Error::Io("failed to create staging directory", e))?;

        let out = format!("paths=source_relative:{}", staging.path().display());
        let command = self
            .config
            .protoc
            .clone()
            .with_args([
                format!("--proto_path={}", self.config.proto_root.display()),
                format!("--go_out={out}"),
                format!("--go-grpc_out={out}"),
                schema.display().to_string(),
            ])
            .with_working_dir(&self.config.root_dir);

        let output = self.runner.run(&command).await?;
        if !output.is_success() {
            return Err(Error::Compiler {
                schema,
                code: output.code,
                diagnostic: output.diagnostic().to_string(),
            });
        }

        fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| Error::Io("failed to create output directory", e))?;

        let mut moved = Vec::new();
        for file in collect_files(staging.path()).await? {
            let Some(name) = file.file_name() else {
                continue;
            };
            let target = job.output_dir.join(name);
            fs::rename(&file, &target)
                .await
                .map_err(|e| Error::Io("failed to move generated file", e))?;
            debug!("Moved {} to {}", file.display(), target.display());
            moved.push(target);
        }
        moved.sort();

        Ok(moved)
    }
}

/// Every regular file below `dir`, at any depth.
async fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current)
            .await
            .map_err(|e| Error::Io("failed to read generated output", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Io("failed to read generated output", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::Io("failed to inspect generated output", e))?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_jobs() {
        let config = CodegenConfig::from_root("/repo");

        assert_eq!(config.proto_root, Path::new("/repo/proto"));
        assert_eq!(config.protoc.to_string(), "protoc");

        let jobs: Vec<_> = config
            .jobs
            .iter()
            .map(|job| (job.schema.clone(), job.output_dir.clone()))
            .collect();
        assert_eq!(
            jobs,
            vec![
                (
                    PathBuf::from("vectorxlite/v1/vectorxlite.proto"),
                    PathBuf::from("/repo/standalone/clients/go/pb")
                ),
                (
                    PathBuf::from("cluster/v1/cluster.proto"),
                    PathBuf::from("/repo/distributed/cluster/pkg/pb")
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_files_walks_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("top.go"), "").unwrap();
        std::fs::write(dir.path().join("a/b/deep.go"), "").unwrap();

        let mut names: Vec<_> = collect_files(dir.path())
            .await
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["deep.go", "top.go"]);
    }
}

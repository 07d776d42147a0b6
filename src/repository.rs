//! Model repository layout: one subdirectory per model, each containing a
//! line-oriented config file naming its platform and tensors. Mirrors the
//! original's `config.pbtxt` idea in spirit — `name`, `platform`, `inputs`,
//! `outputs`, `parameters` fields — but as a plain `key: value` text format
//! rather than protobuf text format, since no `.proto` schema survived into
//! this pack.

use crate::error::{Error, Result};
use crate::parameters::ParameterMap;
use crate::types::DataType;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.txt";

#[derive(Debug, Clone)]
pub struct TensorSpec {
    pub name: String,
    pub datatype: DataType,
    pub shape: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub platform: String,
    pub worker_kind: String,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub parameters: ParameterMap,
}

/// Maps a model's declared `platform` string onto the worker-kind library
/// that should be loaded to serve it. Only `echo` ships in this crate; the
/// rest name an external worker-kind plugin the deployer supplies.
pub fn platform_to_worker_kind(platform: &str) -> Result<&'static str> {
    match platform {
        "native" | "echo" => Ok("echo"),
        "tensorflow_graphdef" => Ok("tfzendnn"),
        "pytorch_torchscript" => Ok("ptzendnn"),
        "onnx_onnxv1" => Ok("migraphx"),
        "vitis_xmodel" => Ok("xmodel"),
        other => Err(Error::invalid_argument(format!(
            "no built-in worker kind for platform '{other}'; supply a worker-kind plugin"
        ))),
    }
}

fn parse_shape(value: &str) -> Result<Vec<i64>> {
    value
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::invalid_argument(format!("bad shape dimension: {s}")))
        })
        .collect()
}

fn parse_tensor_line(value: &str) -> Result<TensorSpec> {
    // `name:datatype:shape`, e.g. `input:FP32:[1,3,224,224]`.
    let mut parts = value.splitn(3, ':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_argument("tensor spec missing name"))?;
    let datatype = parts
        .next()
        .ok_or_else(|| Error::invalid_argument("tensor spec missing datatype"))?;
    let shape = parts
        .next()
        .ok_or_else(|| Error::invalid_argument("tensor spec missing shape"))?;

    Ok(TensorSpec {
        name: name.to_string(),
        datatype: DataType::from_str(datatype)?,
        shape: parse_shape(shape)?,
    })
}

/// Parse a `config.txt` body into a [`ModelConfig`]. Unknown keys are
/// ignored rather than rejected, matching the original's tolerance of
/// forward-compatible fields.
pub fn parse_config(name: &str, text: &str) -> Result<ModelConfig> {
    let mut platform = None;
    let mut batch_size = 1usize;
    let mut timeout_ms = 0u64;
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut parameters = ParameterMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "platform" => platform = Some(value.to_string()),
            "batch_size" => {
                batch_size = value
                    .parse()
                    .map_err(|_| Error::invalid_argument(format!("bad batch_size: {value}")))?
            }
            "timeout_ms" => {
                timeout_ms = value
                    .parse()
                    .map_err(|_| Error::invalid_argument(format!("bad timeout_ms: {value}")))?
            }
            "input" => inputs.push(parse_tensor_line(value)?),
            "output" => outputs.push(parse_tensor_line(value)?),
            _ => {
                if let Some(param_key) = key.strip_prefix("parameter.") {
                    parameters.put(param_key.to_string(), value.to_string());
                }
            }
        }
    }

    let platform = platform.ok_or_else(|| Error::invalid_argument("config missing 'platform'"))?;
    let worker_kind = platform_to_worker_kind(&platform)?.to_string();

    Ok(ModelConfig {
        name: name.to_string(),
        platform,
        worker_kind,
        batch_size,
        timeout_ms,
        inputs,
        outputs,
        parameters,
    })
}

pub struct Repository {
    root: PathBuf,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Repository { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan immediate subdirectories of the repository root, parsing each
    /// one's `config.txt`. A subdirectory without one is skipped rather than
    /// treated as an error, so stray non-model directories don't break
    /// discovery.
    pub fn discover(&self) -> Result<Vec<ModelConfig>> {
        let mut configs = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Error::file_not_found(format!("{}: {e}", self.root.display())))?;

        for entry in entries {
            let entry = entry.map_err(|e| Error::runtime(e.to_string()))?;
            if !entry.path().is_dir() {
                continue;
            }
            let config_path = entry.path().join(CONFIG_FILE_NAME);
            if !config_path.exists() {
                continue;
            }
            let name = entry
                .file_name()
                .to_str()
                .ok_or_else(|| Error::invalid_argument("non-utf8 model directory name"))?
                .to_string();
            let text = std::fs::read_to_string(&config_path)
                .map_err(|e| Error::runtime(format!("{}: {e}", config_path.display())))?;
            configs.push(parse_config(&name, &text)?);
        }

        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_config() {
        let text = "platform: native\nbatch_size: 4\ntimeout_ms: 50\ninput: in:FP32:[1,3]\noutput: out:FP32:[1,3]\nparameter.top_k: 5\n";
        let config = parse_config("echo-model", text).unwrap();
        assert_eq!(config.worker_kind, "echo");
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.inputs[0].shape, vec![1, 3]);
        assert_eq!(config.parameters.get_str("top_k"), Some("5"));
    }

    #[test]
    fn missing_platform_is_rejected() {
        assert!(parse_config("bad", "batch_size: 1\n").is_err());
    }

    #[test]
    fn unsupported_platform_has_no_worker_kind() {
        assert!(platform_to_worker_kind("tensorrt").is_err());
    }

    #[test]
    fn maps_every_supported_platform_to_its_worker_kind() {
        assert_eq!(platform_to_worker_kind("tensorflow_graphdef").unwrap(), "tfzendnn");
        assert_eq!(platform_to_worker_kind("pytorch_torchscript").unwrap(), "ptzendnn");
        assert_eq!(platform_to_worker_kind("onnx_onnxv1").unwrap(), "migraphx");
        assert_eq!(platform_to_worker_kind("vitis_xmodel").unwrap(), "xmodel");
    }

    #[test]
    fn discover_skips_directories_without_a_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("not-a-model")).unwrap();
        std::fs::create_dir(dir.path().join("echo")).unwrap();
        std::fs::write(dir.path().join("echo").join(CONFIG_FILE_NAME), "platform: native\n").unwrap();

        let repo = Repository::new(dir.path());
        let configs = repo.discover().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "echo");
    }
}

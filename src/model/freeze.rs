//! Frozen inference artifacts
//!
//! Freezing takes trained parameters off the autodiff backend and pins a set
//! of named entry points around them. Each subgraph is a fixed-window
//! inference path (batch 1) with its own scope:
//!
//! ```text
//! {scope}/inputs                         [1, window, input_size]
//! {scope}/softmax/output                 [window, output_size]
//! {scope}/initial_state/layer_{i}/{c,h}  [1, hidden]   defaults to zeros
//! {scope}/final_state/layer_{i}/{c,h}    [1, hidden]
//! {scope}/initial_state_names            ordered list of the initial names
//! {scope}/final_state_names              ordered list of the final names
//! zeros                                  [1, hidden]
//! ```
//!
//! The two `*_state_names` nodes fetch as [`FetchValue::Names`]; every other
//! name fetches as [`FetchValue::Tensor`].

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use burn::{
    module::{AutodiffModule, Module},
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor, TensorData,
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::checkpoint::load_matching;
use super::clip::params_are_finite;
use super::config::ModelConfig;
use super::rnn::RnnModel;
use super::state::{LayerState, ModelState};
use crate::error::{Result, SeqLstmError};

pub const ZEROS: &str = "zeros";
pub const STEP_SCOPE: &str = "step_inference";
pub const SEQ_SCOPE: &str = "seq_inference";

const MANIFEST_FILE: &str = "manifest.json";
const PARAMS_STEM: &str = "params";

type Recorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// A dense float value crossing the frozen-graph boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl HostTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(SeqLstmError::shape("host tensor", expected, data.len()));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    fn from_tensor<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Self {
        let shape = tensor.dims().to_vec();
        Self {
            shape,
            data: tensor.into_data().iter::<f32>().collect(),
        }
    }

    fn to_tensor<B: Backend, const D: usize>(&self, shape: [usize; D], device: &B::Device) -> Tensor<B, D> {
        Tensor::from_data(TensorData::new(self.data.clone(), shape), device)
    }

    /// Row `r` of a 2-D value, `None` past the last row.
    pub fn row(&self, r: usize) -> Option<&[f32]> {
        let width = self.shape.last().copied().unwrap_or(0);
        self.data.get(r * width..(r + 1) * width)
    }
}

/// One fetched value: a tensor, or the ordered state names of a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchValue {
    Tensor(HostTensor),
    Names(Vec<String>),
}

impl FetchValue {
    pub fn as_tensor(&self) -> Option<&HostTensor> {
        match self {
            Self::Tensor(t) => Some(t),
            Self::Names(_) => None,
        }
    }

    pub fn into_tensor(self) -> Option<HostTensor> {
        match self {
            Self::Tensor(t) => Some(t),
            Self::Names(_) => None,
        }
    }

    pub fn as_names(&self) -> Option<&[String]> {
        match self {
            Self::Names(names) => Some(names),
            Self::Tensor(_) => None,
        }
    }
}

/// Inference path to materialize: a scope name and a fixed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgraph {
    pub scope: String,
    pub window: usize,
}

impl Subgraph {
    pub fn step() -> Self {
        Self {
            scope: STEP_SCOPE.to_string(),
            window: 1,
        }
    }

    pub fn seq(window: usize) -> Self {
        Self {
            scope: SEQ_SCOPE.to_string(),
            window,
        }
    }
}

/// Names exposed by one subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPoints {
    pub scope: String,
    pub window: usize,
    pub inputs: String,
    pub output: String,
    pub initial_state: Vec<String>,
    pub final_state: Vec<String>,
    pub initial_state_names: String,
    pub final_state_names: String,
}

impl EntryPoints {
    fn new(subgraph: &Subgraph, num_layers: usize) -> Self {
        let scope = &subgraph.scope;
        let state_names = |kind: &str| {
            (0..num_layers)
                .flat_map(|i| {
                    [
                        format!("{scope}/{kind}/layer_{i}/c"),
                        format!("{scope}/{kind}/layer_{i}/h"),
                    ]
                })
                .collect::<Vec<_>>()
        };
        Self {
            scope: scope.clone(),
            window: subgraph.window,
            inputs: format!("{scope}/inputs"),
            output: format!("{scope}/softmax/output"),
            initial_state: state_names("initial_state"),
            final_state: state_names("final_state"),
            initial_state_names: format!("{scope}/initial_state_names"),
            final_state_names: format!("{scope}/final_state_names"),
        }
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        [
            self.inputs.as_str(),
            self.output.as_str(),
            self.initial_state_names.as_str(),
            self.final_state_names.as_str(),
        ]
        .into_iter()
        .chain(self.initial_state.iter().map(String::as_str))
        .chain(self.final_state.iter().map(String::as_str))
    }
}

/// Everything needed to rebuild and drive a frozen artifact by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphManifest {
    pub model: ModelConfig,
    pub trained_steps: usize,
    pub zeros: String,
    pub subgraphs: Vec<EntryPoints>,
}

impl GraphManifest {
    pub fn entry_points(&self, scope: &str) -> Result<&EntryPoints> {
        self.subgraphs
            .iter()
            .find(|e| e.scope == scope)
            .ok_or_else(|| SeqLstmError::UnknownEntryPoint(scope.to_string()))
    }

    /// Every preserved name, in manifest order.
    pub fn preserved_names(&self) -> Vec<&str> {
        std::iter::once(self.zeros.as_str())
            .chain(self.subgraphs.iter().flat_map(|e| e.names()))
            .collect()
    }
}

pub struct GraphFreezer {
    subgraphs: Vec<Subgraph>,
}

impl Default for GraphFreezer {
    fn default() -> Self {
        Self::new(vec![Subgraph::step(), Subgraph::seq(100)])
    }
}

impl GraphFreezer {
    pub fn new(subgraphs: Vec<Subgraph>) -> Self {
        Self { subgraphs }
    }

    /// Single-step plus a `seq_window`-frame subgraph.
    pub fn with_seq_window(seq_window: usize) -> Self {
        Self::new(vec![Subgraph::step(), Subgraph::seq(seq_window)])
    }

    /// Freezes a model that still lives on the training backend.
    pub fn freeze<AB: AutodiffBackend>(
        &self,
        model: &RnnModel<AB>,
        model_config: &ModelConfig,
        trained_steps: usize,
        device: &<AB::InnerBackend as Backend>::Device,
    ) -> Result<FrozenGraph<AB::InnerBackend>> {
        self.freeze_constants(model.valid(), model_config, trained_steps, device)
    }

    /// Freezes parameters already on an inference backend.
    pub fn freeze_constants<B: Backend>(
        &self,
        model: RnnModel<B>,
        model_config: &ModelConfig,
        trained_steps: usize,
        device: &B::Device,
    ) -> Result<FrozenGraph<B>> {
        let mut seen = HashSet::new();
        for sub in &self.subgraphs {
            if !seen.insert(sub.scope.as_str()) {
                return Err(SeqLstmError::ExportIncomplete(format!(
                    "scope `{}` requested twice",
                    sub.scope
                )));
            }
            if sub.window == 0 {
                return Err(SeqLstmError::ExportIncomplete(format!(
                    "scope `{}` has an empty window",
                    sub.scope
                )));
            }
        }
        if self.subgraphs.is_empty() {
            return Err(SeqLstmError::ExportIncomplete("no subgraphs requested".into()));
        }

        let manifest = GraphManifest {
            model: model_config.clone(),
            trained_steps,
            zeros: ZEROS.to_string(),
            subgraphs: self
                .subgraphs
                .iter()
                .map(|s| EntryPoints::new(s, model.num_layers()))
                .collect(),
        };

        let graph = FrozenGraph {
            model,
            manifest,
            device: device.clone(),
        };
        graph.validate()?;
        info!(
            subgraphs = graph.manifest.subgraphs.len(),
            trained_steps, "graph frozen"
        );
        Ok(graph)
    }
}

/// Immutable inference artifact. It exposes no training path.
pub struct FrozenGraph<B: Backend> {
    model: RnnModel<B>,
    manifest: GraphManifest,
    device: B::Device,
}

impl<B: Backend> FrozenGraph<B> {
    pub fn manifest(&self) -> &GraphManifest {
        &self.manifest
    }

    /// Export-time checks: parameters trained and finite, and every name the
    /// model shape requires present in the manifest in canonical order.
    pub fn validate(&self) -> Result<()> {
        if self.manifest.trained_steps == 0 {
            return Err(SeqLstmError::ExportIncomplete(
                "parameters were never trained".into(),
            ));
        }
        if !params_are_finite::<B, _>(&self.model) {
            return Err(SeqLstmError::ExportIncomplete(
                "parameters contain non-finite values".into(),
            ));
        }
        let cfg = &self.manifest.model;
        if cfg.input_size != self.model.input_size()
            || cfg.output_size != self.model.output_size()
            || cfg.hidden_size != self.model.hidden_size()
            || cfg.num_layers != self.model.num_layers()
        {
            return Err(SeqLstmError::ExportIncomplete(
                "manifest model config does not match parameters".into(),
            ));
        }
        if self.manifest.zeros != ZEROS {
            return Err(SeqLstmError::ExportIncomplete(format!(
                "required name `{ZEROS}` is not in the graph"
            )));
        }
        if self.manifest.subgraphs.is_empty() {
            return Err(SeqLstmError::ExportIncomplete("no subgraphs in manifest".into()));
        }

        let num_layers = self.model.num_layers();
        let mut scopes = HashSet::new();
        for entry in &self.manifest.subgraphs {
            if !scopes.insert(entry.scope.as_str()) {
                return Err(SeqLstmError::ExportIncomplete(format!(
                    "duplicate scope `{}`",
                    entry.scope
                )));
            }
            if entry.window == 0 {
                return Err(SeqLstmError::ExportIncomplete(format!(
                    "scope `{}` has an empty window",
                    entry.scope
                )));
            }
            let required = EntryPoints::new(
                &Subgraph {
                    scope: entry.scope.clone(),
                    window: entry.window,
                },
                num_layers,
            );
            if *entry == required {
                continue;
            }
            let present: HashSet<&str> = entry.names().collect();
            return Err(match required.names().find(|n| !present.contains(n)) {
                Some(missing) => SeqLstmError::ExportIncomplete(format!(
                    "required name `{missing}` is not in the graph"
                )),
                None => SeqLstmError::ExportIncomplete(format!(
                    "scope `{}` does not match a {num_layers}-layer model",
                    entry.scope
                )),
            });
        }
        Ok(())
    }

    /// Runs `scope` once. `feeds` must hold `{scope}/inputs`; initial-state
    /// feeds are optional and default to zeros. Returns one value per fetch.
    pub fn run(
        &self,
        scope: &str,
        feeds: &HashMap<String, HostTensor>,
        fetches: &[&str],
    ) -> Result<HashMap<String, FetchValue>> {
        let entry = self.manifest.entry_points(scope)?;
        let input_size = self.model.input_size();
        let hidden = self.model.hidden_size();

        for name in feeds.keys() {
            if *name != entry.inputs && !entry.initial_state.contains(name) {
                return Err(SeqLstmError::UnknownEntryPoint(name.clone()));
            }
        }

        let inputs = feeds
            .get(&entry.inputs)
            .ok_or_else(|| SeqLstmError::ConfigError(format!("missing feed `{}`", entry.inputs)))?;
        if inputs.data.len() != entry.window * input_size {
            return Err(SeqLstmError::shape(
                "frozen graph inputs",
                format!("[1, {}, {}]", entry.window, input_size),
                format!("{:?}", inputs.shape),
            ));
        }

        let mut layers = Vec::with_capacity(self.model.num_layers());
        for pair in entry.initial_state.chunks_exact(2) {
            let read = |name: &String| -> Result<Tensor<B, 2>> {
                match feeds.get(name) {
                    Some(value) if value.data.len() == hidden => {
                        Ok(value.to_tensor([1, hidden], &self.device))
                    }
                    Some(value) => Err(SeqLstmError::shape(
                        "frozen graph state",
                        format!("[1, {hidden}]"),
                        format!("{:?}", value.shape),
                    )),
                    None => Ok(Tensor::zeros([1, hidden], &self.device)),
                }
            };
            let memory = read(&pair[0])?;
            let hidden_state = read(&pair[1])?;
            layers.push(LayerState {
                memory,
                hidden: hidden_state,
            });
        }
        let state = ModelState::from_layers(layers);

        let x = inputs.to_tensor([1, entry.window, input_size], &self.device);
        let (probs, final_state) = self.model.window_probabilities(state, x)?;

        let mut produced: HashMap<&str, FetchValue> = HashMap::new();
        produced.insert(
            entry.output.as_str(),
            FetchValue::Tensor(HostTensor::from_tensor(probs)),
        );
        for (layer, pair) in final_state
            .into_layers()
            .into_iter()
            .zip(entry.final_state.chunks_exact(2))
        {
            produced.insert(pair[0].as_str(), FetchValue::Tensor(HostTensor::from_tensor(layer.memory)));
            produced.insert(pair[1].as_str(), FetchValue::Tensor(HostTensor::from_tensor(layer.hidden)));
        }
        produced.insert(
            entry.initial_state_names.as_str(),
            FetchValue::Names(entry.initial_state.clone()),
        );
        produced.insert(
            entry.final_state_names.as_str(),
            FetchValue::Names(entry.final_state.clone()),
        );
        produced.insert(
            self.manifest.zeros.as_str(),
            FetchValue::Tensor(HostTensor::zeros(vec![1, hidden])),
        );

        let mut out = HashMap::with_capacity(fetches.len());
        for &name in fetches {
            let value = produced
                .get(name)
                .cloned()
                .ok_or_else(|| SeqLstmError::UnknownEntryPoint(name.to_string()))?;
            out.insert(name.to_string(), value);
        }
        Ok(out)
    }

    /// Probabilities for a whole window through `seq_inference`, zero state.
    pub fn seq_probabilities(&self, frames: &[f32]) -> Result<HostTensor> {
        let entry = self.manifest.entry_points(SEQ_SCOPE)?;
        let inputs = HostTensor::new(
            vec![1, entry.window, self.model.input_size()],
            frames.to_vec(),
        )?;
        let feeds = HashMap::from([(entry.inputs.clone(), inputs)]);
        let output = entry.output.clone();
        let mut out = self.run(SEQ_SCOPE, &feeds, &[output.as_str()])?;
        out.remove(&output)
            .and_then(FetchValue::into_tensor)
            .ok_or_else(|| SeqLstmError::UnknownEntryPoint(output))
    }

    pub fn step_session(&self) -> Result<StepSession<'_, B>> {
        let entry = self.manifest.entry_points(STEP_SCOPE)?.clone();
        Ok(StepSession {
            graph: self,
            entry,
            state: HashMap::new(),
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|source| SeqLstmError::FileWrite {
            path: dir.to_path_buf(),
            source,
        })?;
        let manifest_path = dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, serde_json::to_string_pretty(&self.manifest)?).map_err(
            |source| SeqLstmError::FileWrite {
                path: manifest_path.clone(),
                source,
            },
        )?;
        let params = dir.join(PARAMS_STEM);
        self.model
            .clone()
            .save_file(params.clone(), &Recorder::new())
            .map_err(|e| SeqLstmError::FileWrite {
                path: params,
                source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            })?;
        info!("frozen graph written to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: &Path, device: &B::Device) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&manifest_path).map_err(|source| SeqLstmError::FileRead {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: GraphManifest = serde_json::from_str(&json)?;
        let params = dir.join(PARAMS_STEM);
        let model = load_matching(RnnModel::new(&manifest.model, device), &params, device)?;
        let graph = Self {
            model,
            manifest,
            device: device.clone(),
        };
        graph.validate()?;
        Ok(graph)
    }
}

/// Frame-by-frame driver over `step_inference` that feeds each final state
/// back as the next initial state.
pub struct StepSession<'a, B: Backend> {
    graph: &'a FrozenGraph<B>,
    entry: EntryPoints,
    state: HashMap<String, HostTensor>,
}

impl<B: Backend> StepSession<'_, B> {
    pub fn reset(&mut self) {
        self.state.clear();
    }

    /// One frame in, one probability row out.
    pub fn step(&mut self, frame: &[f32]) -> Result<Vec<f32>> {
        let mut feeds = std::mem::take(&mut self.state);
        feeds.insert(
            self.entry.inputs.clone(),
            HostTensor::new(vec![1, 1, frame.len()], frame.to_vec())?,
        );

        let mut fetches: Vec<&str> = vec![self.entry.output.as_str()];
        fetches.extend(self.entry.final_state.iter().map(String::as_str));
        let mut out = self.graph.run(&self.entry.scope, &feeds, &fetches)?;

        for (initial, last) in self.entry.initial_state.iter().zip(&self.entry.final_state) {
            if let Some(value) = out.remove(last).and_then(FetchValue::into_tensor) {
                self.state.insert(initial.clone(), value);
            }
        }
        out.remove(&self.entry.output)
            .and_then(FetchValue::into_tensor)
            .map(|probs| probs.data)
            .ok_or_else(|| SeqLstmError::UnknownEntryPoint(self.entry.output.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_names_follow_layout() {
        let entry = EntryPoints::new(&Subgraph::step(), 2);
        assert_eq!(entry.inputs, "step_inference/inputs");
        assert_eq!(entry.output, "step_inference/softmax/output");
        assert_eq!(
            entry.initial_state,
            vec![
                "step_inference/initial_state/layer_0/c",
                "step_inference/initial_state/layer_0/h",
                "step_inference/initial_state/layer_1/c",
                "step_inference/initial_state/layer_1/h",
            ]
        );
        assert_eq!(entry.final_state.len(), 4);
        assert_eq!(entry.final_state_names, "step_inference/final_state_names");
    }

    #[test]
    fn host_tensor_checks_length() {
        assert!(HostTensor::new(vec![2, 3], vec![0.0; 5]).is_err());
        let t = HostTensor::new(vec![2, 3], (0..6).map(|x| x as f32).collect()).unwrap();
        assert_eq!(t.row(1), Some(&[3.0, 4.0, 5.0][..]));
        assert_eq!(t.row(2), None);
    }
}

use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use super::rng::SimpleRng;

pub const ARTIFACT_FORMAT: &str = "rusty-ecg/convnet";
pub const ARTIFACT_VERSION: u32 = 1;

const CONV1_FILTERS: usize = 32;
const CONV2_FILTERS: usize = 64;
const KERNEL_SIZE: usize = 5;
const POOL_SIZE: usize = 2;
const HIDDEN_UNITS: usize = 50;

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// 1-D convolution, valid padding, stride 1, channels-last.
///
/// `weights` is the flattened `(kernel_size, in_channels, out_channels)`
/// kernel, the layout Keras exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv1d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl Conv1d {
    fn glorot(in_channels: usize, out_channels: usize, kernel_size: usize, rng: &mut SimpleRng) -> Self {
        let fan_in = in_channels * kernel_size;
        let fan_out = out_channels * kernel_size;
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        Conv1d {
            in_channels,
            out_channels,
            kernel_size,
            weights: (0..kernel_size * in_channels * out_channels)
                .map(|_| rng.uniform(-limit, limit))
                .collect(),
            bias: vec![0.0; out_channels],
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        ensure!(self.kernel_size > 0, "{name}: kernel_size must be positive");
        ensure!(
            self.weights.len() == self.kernel_size * self.in_channels * self.out_channels,
            "{name}: expected {}x{}x{} weights, found {}",
            self.kernel_size,
            self.in_channels,
            self.out_channels,
            self.weights.len()
        );
        ensure!(
            self.bias.len() == self.out_channels,
            "{name}: expected {} biases, found {}",
            self.out_channels,
            self.bias.len()
        );
        Ok(())
    }

    /// `input` holds `len` steps of `in_channels` values; returns the ReLU
    /// activations and the output length.
    fn forward_relu(&self, input: &[f64], len: usize) -> (Vec<f64>, usize) {
        let out_len = len + 1 - self.kernel_size;
        let (cin, cout) = (self.in_channels, self.out_channels);
        let mut out = vec![0.0; out_len * cout];

        for t in 0..out_len {
            let acc = &mut out[t * cout..(t + 1) * cout];
            acc.copy_from_slice(&self.bias);
            for j in 0..self.kernel_size {
                let step = &input[(t + j) * cin..(t + j + 1) * cin];
                for (c, &x) in step.iter().enumerate() {
                    let w = &self.weights[(j * cin + c) * cout..(j * cin + c + 1) * cout];
                    for (a, &wv) in acc.iter_mut().zip(w) {
                        *a += x * wv;
                    }
                }
            }
            for a in acc.iter_mut() {
                *a = a.max(0.0);
            }
        }
        (out, out_len)
    }
}

/// Fully connected layer; `weights` is the flattened `(inputs, outputs)` matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl Dense {
    fn glorot(inputs: usize, outputs: usize, rng: &mut SimpleRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        Dense {
            inputs,
            outputs,
            weights: (0..inputs * outputs)
                .map(|_| rng.uniform(-limit, limit))
                .collect(),
            bias: vec![0.0; outputs],
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        ensure!(
            self.weights.len() == self.inputs * self.outputs,
            "{name}: expected {}x{} weights, found {}",
            self.inputs,
            self.outputs,
            self.weights.len()
        );
        ensure!(
            self.bias.len() == self.outputs,
            "{name}: expected {} biases, found {}",
            self.outputs,
            self.bias.len()
        );
        Ok(())
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out = self.bias.clone();
        for (i, &x) in input.iter().enumerate() {
            let row = &self.weights[i * self.outputs..(i + 1) * self.outputs];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        out
    }
}

/// Channels-last max pooling with stride equal to the window; a trailing
/// partial window is dropped.
fn max_pool(input: &[f64], len: usize, channels: usize) -> (Vec<f64>, usize) {
    let out_len = len / POOL_SIZE;
    let mut out = vec![f64::NEG_INFINITY; out_len * channels];
    for t in 0..out_len {
        for p in 0..POOL_SIZE {
            let src = &input[(t * POOL_SIZE + p) * channels..(t * POOL_SIZE + p + 1) * channels];
            for (o, &v) in out[t * channels..(t + 1) * channels].iter_mut().zip(src) {
                *o = o.max(v);
            }
        }
    }
    (out, out_len)
}

/// Steps left after a valid convolution followed by pooling, or `None` when
/// either stage would produce nothing.
fn conv_pool_len(len: usize, kernel_size: usize) -> Option<usize> {
    let conv = len.checked_sub(kernel_size.checked_sub(1)?)?;
    let pooled = conv / POOL_SIZE;
    (conv > 0 && pooled > 0).then_some(pooled)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

// ---------------------------------------------------------------------------
// ConvNet – the heartbeat classifier
// ---------------------------------------------------------------------------

/// `Conv1D(relu) → MaxPool → Conv1D(relu) → MaxPool → Flatten → Dense(relu)
/// → Dense(sigmoid)` over an `(input_len, 1)` signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvNet {
    pub input_len: usize,
    pub conv1: Conv1d,
    pub conv2: Conv1d,
    pub dense1: Dense,
    pub dense2: Dense,
}

impl ConvNet {
    /// Smallest input the default architecture can consume.
    pub fn min_input_len() -> usize {
        (1..)
            .find(|&len| Self::flattened_len(len, KERNEL_SIZE, KERNEL_SIZE, CONV2_FILTERS).is_some())
            .unwrap_or(usize::MAX)
    }

    fn flattened_len(input_len: usize, k1: usize, k2: usize, channels: usize) -> Option<usize> {
        let p1 = conv_pool_len(input_len, k1)?;
        let p2 = conv_pool_len(p1, k2)?;
        Some(p2 * channels)
    }

    /// Build the default architecture with Glorot-uniform weights.
    pub fn initialized(input_len: usize, seed: u64) -> Result<Self> {
        let Some(flat) = Self::flattened_len(input_len, KERNEL_SIZE, KERNEL_SIZE, CONV2_FILTERS) else {
            bail!(
                "signal length {input_len} is too short for the default architecture (needs at least {})",
                Self::min_input_len()
            );
        };
        let mut rng = SimpleRng::new(seed);
        Ok(ConvNet {
            input_len,
            conv1: Conv1d::glorot(1, CONV1_FILTERS, KERNEL_SIZE, &mut rng),
            conv2: Conv1d::glorot(CONV1_FILTERS, CONV2_FILTERS, KERNEL_SIZE, &mut rng),
            dense1: Dense::glorot(flat, HIDDEN_UNITS, &mut rng),
            dense2: Dense::glorot(HIDDEN_UNITS, 1, &mut rng),
        })
    }

    /// Check that every tensor agrees with its neighbours and with `input_len`.
    pub fn validate(&self) -> Result<()> {
        self.conv1.check("conv1")?;
        self.conv2.check("conv2")?;
        self.dense1.check("dense1")?;
        self.dense2.check("dense2")?;

        ensure!(self.conv1.in_channels == 1, "conv1: expected a single input channel");
        ensure!(
            self.conv2.in_channels == self.conv1.out_channels,
            "conv2: takes {} channels but conv1 produces {}",
            self.conv2.in_channels,
            self.conv1.out_channels
        );
        let flat = Self::flattened_len(
            self.input_len,
            self.conv1.kernel_size,
            self.conv2.kernel_size,
            self.conv2.out_channels,
        )
        .with_context(|| format!("input length {} is too short for the kernels", self.input_len))?;
        ensure!(
            self.dense1.inputs == flat,
            "dense1: takes {} features but the convolution stack produces {flat}",
            self.dense1.inputs
        );
        ensure!(
            self.dense2.inputs == self.dense1.outputs,
            "dense2: takes {} features but dense1 produces {}",
            self.dense2.inputs,
            self.dense1.outputs
        );
        ensure!(self.dense2.outputs == 1, "dense2: expected a single sigmoid output");
        Ok(())
    }

    /// Sigmoid score for one normalized signal of exactly `input_len` values.
    pub fn forward(&self, signal: &[f64]) -> f64 {
        let (h, len) = self.conv1.forward_relu(signal, self.input_len);
        let (h, len) = max_pool(&h, len, self.conv1.out_channels);
        let (h, len) = self.conv2.forward_relu(&h, len);
        let (h, _) = max_pool(&h, len, self.conv2.out_channels);
        let hidden: Vec<f64> = self.dense1.forward(&h).into_iter().map(|v| v.max(0.0)).collect();
        let logit = self.dense2.forward(&hidden)[0];
        sigmoid(logit)
    }
}

// ---------------------------------------------------------------------------
// ModelArtifact – on-disk JSON envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub version: u32,
    pub network: ConvNet,
}

impl ModelArtifact {
    pub fn new(network: ConvNet) -> Self {
        ModelArtifact {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            network,
        }
    }

    /// Read an artifact and check it can serve signals of `input_len`.
    pub fn read(path: &Path, input_len: usize) -> Result<ConvNet> {
        let text = std::fs::read_to_string(path).context("reading model artifact")?;
        let artifact: ModelArtifact =
            serde_json::from_str(&text).context("parsing model artifact")?;

        if artifact.format != ARTIFACT_FORMAT {
            bail!("unknown model format '{}'", artifact.format);
        }
        if artifact.version != ARTIFACT_VERSION {
            bail!(
                "unsupported model version {} (expected {ARTIFACT_VERSION})",
                artifact.version
            );
        }
        if artifact.network.input_len != input_len {
            bail!(
                "model expects signals of length {}, dataset has {input_len}",
                artifact.network.input_len
            );
        }
        artifact.network.validate()?;
        Ok(artifact.network)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).context("creating model artifact")?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)
            .context("writing model artifact")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_architecture_minimum_length() {
        assert_eq!(ConvNet::min_input_len(), 16);
        assert!(ConvNet::initialized(15, 1).is_err());
        assert!(ConvNet::initialized(16, 1).is_ok());
    }

    #[test]
    fn initialized_network_is_valid_for_mitbih_length() {
        let net = ConvNet::initialized(187, 42).unwrap();
        net.validate().unwrap();
        // 187 → 183 → 91 → 87 → 43 steps of 64 channels
        assert_eq!(net.dense1.inputs, 43 * 64);
    }

    #[test]
    fn forward_is_deterministic_probability() {
        let net = ConvNet::initialized(32, 3).unwrap();
        let signal: Vec<f64> = (0..32).map(|i| (i as f64 / 31.0).sin()).collect();
        let a = net.forward(&signal);
        let b = net.forward(&signal);
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
        assert_eq!(net, ConvNet::initialized(32, 3).unwrap());
    }

    #[test]
    fn conv_and_pool_follow_channels_last_layout() {
        let conv = Conv1d {
            in_channels: 1,
            out_channels: 2,
            kernel_size: 2,
            // (k, in, out): k0 → [1, -1], k1 → [1, -1]
            weights: vec![1.0, -1.0, 1.0, -1.0],
            bias: vec![0.0, 0.0],
        };
        let (out, len) = conv.forward_relu(&[1.0, 2.0, 3.0], 3);
        assert_eq!(len, 2);
        assert_eq!(out, vec![3.0, 0.0, 5.0, 0.0]);

        let (pooled, plen) = max_pool(&out, len, 2);
        assert_eq!(plen, 1);
        assert_eq!(pooled, vec![5.0, 0.0]);
    }

    #[test]
    fn validate_rejects_broken_shapes() {
        let mut net = ConvNet::initialized(40, 9).unwrap();
        net.dense1.weights.pop();
        assert!(net.validate().is_err());

        let mut net = ConvNet::initialized(40, 9).unwrap();
        net.input_len = 60;
        assert!(net.validate().is_err());
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
    }
}

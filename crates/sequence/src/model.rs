//! LSTM + 1-D convolution regressor.
//!
//! Input `(batch, seq_len, input_dim)` runs through stacked LSTM layers, a
//! same-padded convolution over time, a mean over time and a linear head,
//! giving `(batch, 1)`.
//!
//! The master weights always live in the `VarMap` as F32. A model built with a
//! half-precision compute dtype casts the weights and the input to that dtype
//! for the forward pass and returns F32 predictions, so gradients flow back to
//! the F32 variables through the casts.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{conv1d, linear, lstm, Conv1d, Conv1dConfig, LSTMConfig, Linear, VarBuilder, VarMap, LSTM, RNN};
use std::collections::HashMap;

/// Model dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Features per time step.
    pub input_dim: usize,
    /// LSTM hidden size and convolution channels.
    pub hidden_dim: usize,
    /// Stacked LSTM layers.
    pub num_layers: usize,
    /// Convolution kernel width (padding is `kernel_size / 2`).
    pub kernel_size: usize,
}

impl ModelConfig {
    /// One LSTM layer and a width-3 kernel.
    pub fn new(input_dim: usize, hidden_dim: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            num_layers: 1,
            kernel_size: 3,
        }
    }
}

/// Layers built over one set of weights.
#[derive(Debug, Clone)]
struct Layers {
    lstm: Vec<LSTM>,
    conv: Conv1d,
    head: Linear,
}

impl Layers {
    fn new(config: &ModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let mut layers = Vec::with_capacity(config.num_layers);
        for i in 0..config.num_layers {
            let in_dim = if i == 0 { config.input_dim } else { config.hidden_dim };
            layers.push(lstm(
                in_dim,
                config.hidden_dim,
                LSTMConfig::default(),
                vb.pp(format!("lstm.{}", i)),
            )?);
        }

        let conv_config = Conv1dConfig {
            padding: config.kernel_size / 2,
            ..Default::default()
        };
        let conv = conv1d(
            config.hidden_dim,
            config.hidden_dim,
            config.kernel_size,
            conv_config,
            vb.pp("conv"),
        )?;
        let head = linear(config.hidden_dim, 1, vb.pp("fc"))?;

        Ok(Self { lstm: layers, conv, head })
    }
}

impl Module for Layers {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mut hidden = x.clone();
        for layer in &self.lstm {
            let states = layer.seq(&hidden)?;
            hidden = layer.states_to_tensor(&states)?;
        }

        // (batch, seq, hidden) -> (batch, hidden, seq) for the convolution
        let conv_in = hidden.transpose(1, 2)?.contiguous()?;
        let conv_out = self.conv.forward(&conv_in)?;
        let pooled = conv_out.mean(2)?;
        self.head.forward(&pooled)
    }
}

#[derive(Clone)]
enum Precision {
    Full(Layers),
    Reduced {
        master: VarMap,
        dtype: DType,
        device: Device,
    },
}

/// Hybrid LSTM/CNN sequence regressor.
#[derive(Clone)]
pub struct LstmCnn {
    config: ModelConfig,
    precision: Precision,
}

impl LstmCnn {
    /// Create a full-precision model with its variables registered under `vb`.
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            config: config.clone(),
            precision: Precision::Full(Layers::new(config, vb)?),
        })
    }

    /// Create a model whose F32 variables live in `varmap` and whose forward
    /// pass runs in `dtype`.
    pub fn with_compute_dtype(
        config: &ModelConfig,
        varmap: &VarMap,
        device: &Device,
        dtype: DType,
    ) -> candle_core::Result<Self> {
        let layers = Layers::new(config, VarBuilder::from_varmap(varmap, DType::F32, device))?;
        let precision = if dtype == DType::F32 {
            Precision::Full(layers)
        } else {
            Precision::Reduced {
                master: varmap.clone(),
                dtype,
                device: device.clone(),
            }
        };
        Ok(Self {
            config: config.clone(),
            precision,
        })
    }

    /// Dtype of the forward pass.
    pub fn compute_dtype(&self) -> DType {
        match &self.precision {
            Precision::Full(_) => DType::F32,
            Precision::Reduced { dtype, .. } => *dtype,
        }
    }
}

/// Cast every master variable to `dtype` and rebuild the layers over the casts.
fn cast_layers(
    config: &ModelConfig,
    master: &VarMap,
    dtype: DType,
    device: &Device,
) -> candle_core::Result<Layers> {
    let tensors = {
        let data = master
            .data()
            .lock()
            .map_err(|e| candle_core::Error::Msg(format!("variable map poisoned: {}", e)))?;
        let mut tensors = HashMap::with_capacity(data.len());
        for (name, var) in data.iter() {
            tensors.insert(name.clone(), var.as_tensor().to_dtype(dtype)?);
        }
        tensors
    };
    Layers::new(config, VarBuilder::from_tensors(tensors, dtype, device))
}

impl Module for LstmCnn {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        match &self.precision {
            Precision::Full(layers) => layers.forward(x),
            Precision::Reduced { master, dtype, device } => {
                let layers = cast_layers(&self.config, master, *dtype, device)?;
                layers.forward(&x.to_dtype(*dtype)?)?.to_dtype(DType::F32)
            }
        }
    }
}

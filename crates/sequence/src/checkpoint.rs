//! Model checkpoints in safetensors format.

use crate::error::Result;
use candle_nn::VarMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write every variable to `path`, replacing any previous checkpoint.
///
/// The file is written next to its destination and renamed into place, so a
/// reader never sees a half-written checkpoint.
pub fn save_checkpoint(varmap: &VarMap, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    varmap.save(&tmp)?;
    fs::rename(&tmp, path)?;

    debug!("Saved checkpoint to {}", path.display());
    Ok(())
}

/// Load variables saved by [`save_checkpoint`] into an existing var map.
pub fn load_checkpoint(varmap: &mut VarMap, path: impl AsRef<Path>) -> Result<()> {
    varmap.load(path.as_ref())?;
    Ok(())
}

/// Keeps the checkpoint of the lowest epoch loss seen so far.
#[derive(Debug, Clone)]
pub struct BestCheckpoint {
    path: PathBuf,
    best_loss: f64,
    best_epoch: Option<usize>,
}

impl BestCheckpoint {
    /// Track the best weights at `path`. Nothing is written until the first
    /// finite loss.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            best_loss: f64::INFINITY,
            best_epoch: None,
        }
    }

    /// Record the loss of `epoch` and save `varmap` if it is a new minimum.
    ///
    /// Returns whether the checkpoint was written.
    pub fn observe(&mut self, epoch: usize, loss: f64, varmap: &VarMap) -> Result<bool> {
        if loss.is_nan() || loss >= self.best_loss {
            return Ok(false);
        }
        save_checkpoint(varmap, &self.path)?;
        self.best_loss = loss;
        self.best_epoch = Some(epoch);
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowest loss seen, infinite before the first save.
    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Epoch of the saved weights.
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LstmCnn, ModelConfig};
    use candle_core::{DType, Device, Module, Tensor};
    use candle_nn::VarBuilder;

    fn build() -> (VarMap, LstmCnn) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = LstmCnn::new(&ModelConfig::new(2, 4), vb).unwrap();
        (varmap, model)
    }

    #[test]
    fn test_saved_weights_restore_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("best_model.safetensors");
        let x = Tensor::ones((1, 3, 2), DType::F32, &Device::Cpu).unwrap();

        let (varmap, model) = build();
        save_checkpoint(&varmap, &path).unwrap();
        let expected: Vec<f32> = model.forward(&x).unwrap().flatten_all().unwrap().to_vec1().unwrap();

        let (mut other_map, other) = build();
        load_checkpoint(&mut other_map, &path).unwrap();
        let actual: Vec<f32> = other.forward(&x).unwrap().flatten_all().unwrap().to_vec1().unwrap();

        assert_eq!(expected, actual);
        assert!(path.exists());
        assert!(!dir.path().join("nested").join("best_model.safetensors.tmp").exists());
    }

    #[test]
    fn test_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        let (first, _) = build();
        save_checkpoint(&first, &path).unwrap();
        let (second, _) = build();
        save_checkpoint(&second, &path).unwrap();

        let (mut restored, _) = build();
        load_checkpoint(&mut restored, &path).unwrap();
        let a = second.data().lock().unwrap()["fc.weight"].as_tensor().to_vec2::<f32>().unwrap();
        let b = restored.data().lock().unwrap()["fc.weight"].as_tensor().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);
    }

    fn set_weights(varmap: &VarMap, value: f32) {
        let var = varmap.data().lock().unwrap()["w"].clone();
        var.set(&Tensor::new(&[value, value], &Device::Cpu).unwrap()).unwrap();
    }

    fn saved_weights(path: &Path) -> Vec<f32> {
        let mut varmap = VarMap::new();
        varmap
            .get(2, "w", candle_nn::Init::Const(0.0), DType::F32, &Device::Cpu)
            .unwrap();
        load_checkpoint(&mut varmap, path).unwrap();
        let var = varmap.data().lock().unwrap()["w"].clone();
        var.as_tensor().to_vec1().unwrap()
    }

    #[test]
    fn test_best_checkpoint_only_on_new_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.safetensors");
        let varmap = VarMap::new();
        varmap
            .get(2, "w", candle_nn::Init::Const(0.0), DType::F32, &Device::Cpu)
            .unwrap();
        let mut best = BestCheckpoint::new(&path);
        assert!(best.best_epoch().is_none());

        set_weights(&varmap, 1.0);
        assert!(best.observe(0, 0.5, &varmap).unwrap());
        let bytes = fs::read(&path).unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();

        // A worse epoch leaves the file alone.
        set_weights(&varmap, 2.0);
        assert!(!best.observe(1, 0.7, &varmap).unwrap());
        assert_eq!(fs::read(&path).unwrap(), bytes);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
        assert_eq!(saved_weights(&path), vec![1.0, 1.0]);
        assert_eq!(best.best_epoch(), Some(0));

        set_weights(&varmap, 3.0);
        assert!(best.observe(2, 0.3, &varmap).unwrap());
        assert_eq!(saved_weights(&path), vec![3.0, 3.0]);
        assert_eq!(best.best_epoch(), Some(2));
        assert_eq!(best.best_loss(), 0.3);

        // Ties and NaN never replace the saved weights.
        set_weights(&varmap, 4.0);
        assert!(!best.observe(3, 0.3, &varmap).unwrap());
        assert!(!best.observe(4, f64::NAN, &varmap).unwrap());
        assert_eq!(saved_weights(&path), vec![3.0, 3.0]);
    }

    #[test]
    fn test_non_finite_first_loss_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.safetensors");
        let (varmap, _) = build();
        let mut best = BestCheckpoint::new(&path);

        assert!(!best.observe(0, f64::INFINITY, &varmap).unwrap());
        assert!(!path.exists());
        assert!(best.best_epoch().is_none());
    }
}

use std::path::Path;
use anyhow::{bail, Result};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use tch::{Tensor, nn, Kind, Device};
use std::fs::File;
use memmap2::MmapOptions;

/// Copies every tensor found in the file into the matching variable of `vs`.
/// Returns the number of variables that were loaded.
///
/// The file must hold exactly the variables of `vs`, with matching shapes.
pub fn load_safetensors<P: AsRef<Path>>(vs: &mut nn::VarStore, path: P) -> Result<usize> {
    let file = File::open(path)?;
    let buffer = unsafe { MmapOptions::new().map(&file)? };
    let tensors = SafeTensors::deserialize(&buffer)?;

    let mut variables = vs.variables();
    let device = vs.device();
    let mut loaded = 0;

    for (name, view) in tensors.tensors() {
        let Some(var) = variables.get_mut(&name) else {
            bail!("tensor {} found in safetensors but not in model", name);
        };

        let shape: Vec<i64> = view.shape().iter().map(|&x| x as i64).collect();
        if shape != var.size() {
            bail!(
                "tensor {} has shape {:?} in safetensors but {:?} in model",
                name,
                shape,
                var.size()
            );
        }
        let kind = match view.dtype() {
            Dtype::F32 => Kind::Float,
            Dtype::F16 => Kind::Half,
            Dtype::BF16 => Kind::BFloat16,
            _ => bail!("Unsupported dtype: {:?}", view.dtype()),
        };

        let data = view.data();
        let tch_tensor = Tensor::f_from_data_size(data, &shape, kind)?.to_device(device);

        tch::no_grad(|| var.f_copy_(&tch_tensor))?;
        loaded += 1;
    }

    if loaded != variables.len() {
        let mut missing: Vec<&String> = variables
            .keys()
            .filter(|name| tensors.tensor(name).is_err())
            .collect();
        missing.sort();
        bail!("safetensors file is missing model tensors: {:?}", missing);
    }

    Ok(loaded)
}

/// Writes every variable of `vs` as little-endian f32.
pub fn save_safetensors<P: AsRef<Path>>(vs: &nn::VarStore, path: P) -> Result<()> {
    let mut buffers: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::new();

    for (name, var) in vs.variables() {
        let tensor = var.to_device(Device::Cpu).to_kind(Kind::Float).contiguous();
        let shape: Vec<usize> = tensor.size().iter().map(|&d| d as usize).collect();
        let values = Vec::<f32>::try_from(&tensor.flatten(0, -1))?;
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        buffers.push((name, shape, bytes));
    }

    let mut views = Vec::with_capacity(buffers.len());
    for (name, shape, bytes) in &buffers {
        views.push((name.clone(), TensorView::new(Dtype::F32, shape.clone(), bytes)?));
    }

    safetensors::serialize_to_file(views, &None, path.as_ref())?;
    Ok(())
}

//! A small solid-modelling kernel used for demos and end-to-end tests.
//!
//! It mimics the calling convention of the real kernels: functions are named
//! by dotted path, shapes live in a worker-side table and only handles of the
//! form `{ "type": "occ-shape", "id": 7 }` cross the channel.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vcad_worker_protocol::KernelKind;

use crate::kernel::Kernel;

/// Reference to a shape stored on the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeHandle {
    /// Kernel-specific handle type, e.g. `occ-shape`.
    #[serde(rename = "type")]
    pub kind: HandleType,
    /// Index into the worker's shape table.
    pub id: u64,
}

/// Handle type tag per kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleType {
    /// OCCT shape.
    #[serde(rename = "occ-shape")]
    Occ,
    /// JSCAD geometry.
    #[serde(rename = "jscad-shape")]
    Jscad,
    /// Manifold solid.
    #[serde(rename = "manifold-shape")]
    Manifold,
}

impl From<KernelKind> for HandleType {
    fn from(kind: KernelKind) -> Self {
        match kind {
            KernelKind::Occt => HandleType::Occ,
            KernelKind::Jscad => HandleType::Jscad,
            KernelKind::Manifold => HandleType::Manifold,
        }
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Cuboid { width: f64, length: f64, height: f64 },
    Cylinder { radius: f64, height: f64 },
    Sphere { radius: f64 },
    Translated { base: Box<Shape>, offset: [f64; 3] },
}

impl Shape {
    fn volume(&self) -> f64 {
        match self {
            Shape::Cuboid {
                width,
                length,
                height,
            } => width * length * height,
            Shape::Cylinder { radius, height } => PI * radius * radius * height,
            Shape::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            Shape::Translated { base, .. } => base.volume(),
        }
    }
}

#[derive(Deserialize)]
struct BoxInputs {
    width: f64,
    length: f64,
    height: f64,
}

#[derive(Deserialize)]
struct CylinderInputs {
    radius: f64,
    height: f64,
}

#[derive(Deserialize)]
struct SphereInputs {
    radius: f64,
}

#[derive(Deserialize)]
struct ShapeInputs {
    shape: ShapeHandle,
}

#[derive(Deserialize)]
struct TranslateInputs {
    shape: ShapeHandle,
    translation: [f64; 3],
}

/// Demo kernel with primitive solids, translation and volume queries.
#[derive(Debug)]
pub struct ShapeKernel {
    kind: KernelKind,
    shapes: HashMap<u64, Shape>,
    next_id: u64,
}

impl ShapeKernel {
    /// Create an empty kernel answering as `kind`.
    pub fn new(kind: KernelKind) -> Self {
        Self {
            kind,
            shapes: HashMap::new(),
            next_id: 0,
        }
    }

    /// Number of live shapes on the worker.
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    fn store(&mut self, shape: Shape) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.shapes.insert(id, shape);
        json!(ShapeHandle {
            kind: self.kind.into(),
            id,
        })
    }

    fn lookup(&self, handle: ShapeHandle) -> Result<&Shape, String> {
        if handle.kind != HandleType::from(self.kind) {
            return Err(format!("shape {} belongs to another kernel", handle.id));
        }
        self.shapes
            .get(&handle.id)
            .ok_or_else(|| format!("shape {} does not exist", handle.id))
    }
}

fn parse<T: DeserializeOwned>(function_name: &str, inputs: &Value) -> Result<T, String> {
    T::deserialize(inputs).map_err(|err| format!("invalid inputs for {function_name}: {err}"))
}

fn positive(name: &str, value: f64) -> Result<f64, String> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{name} must be positive, got {value}"))
    }
}

impl Kernel for ShapeKernel {
    fn kind(&self) -> KernelKind {
        self.kind
    }

    fn execute(&mut self, function_name: &str, inputs: &Value) -> Result<Value, String> {
        match function_name {
            "shapes.solid.createBox" => {
                let BoxInputs {
                    width,
                    length,
                    height,
                } = parse(function_name, inputs)?;
                let shape = Shape::Cuboid {
                    width: positive("width", width)?,
                    length: positive("length", length)?,
                    height: positive("height", height)?,
                };
                Ok(self.store(shape))
            }
            "shapes.solid.createCylinder" => {
                let CylinderInputs { radius, height } = parse(function_name, inputs)?;
                let shape = Shape::Cylinder {
                    radius: positive("radius", radius)?,
                    height: positive("height", height)?,
                };
                Ok(self.store(shape))
            }
            "shapes.solid.createSphere" => {
                let SphereInputs { radius } = parse(function_name, inputs)?;
                let shape = Shape::Sphere {
                    radius: positive("radius", radius)?,
                };
                Ok(self.store(shape))
            }
            "operations.translate" => {
                let TranslateInputs { shape, translation } = parse(function_name, inputs)?;
                let base = self.lookup(shape)?.clone();
                Ok(self.store(Shape::Translated {
                    base: Box::new(base),
                    offset: translation,
                }))
            }
            "shapes.solid.getVolume" => {
                let ShapeInputs { shape } = parse(function_name, inputs)?;
                Ok(json!(self.lookup(shape)?.volume()))
            }
            other => Err(format!("function not found: {other}")),
        }
    }

    fn release(&mut self, evicted: &Value) {
        if let Ok(handle) = ShapeHandle::deserialize(evicted) {
            if handle.kind == HandleType::from(self.kind) {
                self.shapes.remove(&handle.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_box_returns_handle() {
        let mut kernel = ShapeKernel::new(KernelKind::Occt);
        let handle = kernel
            .execute(
                "shapes.solid.createBox",
                &json!({ "width": 10, "length": 10, "height": 10 }),
            )
            .unwrap();
        assert_eq!(handle, json!({ "type": "occ-shape", "id": 0 }));

        let volume = kernel
            .execute("shapes.solid.getVolume", &json!({ "shape": handle }))
            .unwrap();
        assert_eq!(volume, json!(1000.0));
    }

    #[test]
    fn test_translate_keeps_volume() {
        let mut kernel = ShapeKernel::new(KernelKind::Manifold);
        let sphere = kernel
            .execute("shapes.solid.createSphere", &json!({ "radius": 1.0 }))
            .unwrap();
        let moved = kernel
            .execute(
                "operations.translate",
                &json!({ "shape": sphere, "translation": [1.0, 2.0, 3.0] }),
            )
            .unwrap();
        assert_eq!(moved["type"], "manifold-shape");

        kernel.release(&sphere);
        let volume = kernel
            .execute("shapes.solid.getVolume", &json!({ "shape": moved }))
            .unwrap();
        assert!((volume.as_f64().unwrap() - 4.0 / 3.0 * PI).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs_are_errors() {
        let mut kernel = ShapeKernel::new(KernelKind::Occt);
        let err = kernel
            .execute("shapes.solid.createCylinder", &json!({ "radius": 1 }))
            .unwrap_err();
        assert!(err.starts_with("invalid inputs for shapes.solid.createCylinder"));

        let err = kernel
            .execute("shapes.solid.createSphere", &json!({ "radius": -2 }))
            .unwrap_err();
        assert_eq!(err, "radius must be positive, got -2");
    }

    #[test]
    fn test_foreign_or_released_handles_are_rejected() {
        let mut kernel = ShapeKernel::new(KernelKind::Occt);
        let err = kernel
            .execute(
                "shapes.solid.getVolume",
                &json!({ "shape": { "type": "jscad-shape", "id": 0 } }),
            )
            .unwrap_err();
        assert!(err.contains("another kernel"));

        let cube = kernel
            .execute(
                "shapes.solid.createBox",
                &json!({ "width": 1, "length": 1, "height": 1 }),
            )
            .unwrap();
        kernel.release(&cube);
        assert_eq!(kernel.shape_count(), 0);
        assert!(kernel
            .execute("shapes.solid.getVolume", &json!({ "shape": cube }))
            .is_err());
    }

    #[test]
    fn test_unknown_function() {
        let mut kernel = ShapeKernel::new(KernelKind::Jscad);
        assert_eq!(
            kernel.execute("booleans.union", &json!({})).unwrap_err(),
            "function not found: booleans.union"
        );
    }
}

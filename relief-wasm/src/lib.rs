// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use anyhow::anyhow;
use nalgebra::{Point3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use relief_lib as relief;
use relief::camera::{CameraFrame, DEFAULT_PADDING};
use relief::compose::{compose, ReliefParams};
use relief::face::{face_placement, FaceCode};
use relief::field::{self, FieldConfig};
use relief::fit::{DesignTarget, DEFAULT_MARGIN};
use relief::mesh::{self, MeshAsset, Orientation};
use relief::session::{BuildTicket, FieldSession};
use relief::ReliefError;

mod utils;

#[wasm_bindgen(raw_module = "../relief-worker.mjs")]
extern "C" {
    /// Give the host a chance to run queued work (and newer requests) between steps.
    #[wasm_bindgen(js_name = "yieldToHost")]
    async fn yield_to_host(step: &str) -> JsValue;
}

// This wrapper trick is because we cannot have async functions referencing &self.
// https://github.com/rustwasm/wasm-bindgen/issues/1858
#[wasm_bindgen]
pub struct Relief(Rc<RefCell<ReliefInner>>);

#[wasm_bindgen]
impl Relief {
    pub fn init() -> Self {
        Relief(Rc::new(RefCell::new(ReliefInner::init())))
    }
    pub fn set_verbosity(&self, verbosity: u32) {
        utils::WasmLogger::setup(utils::verbosity_filter(verbosity));
    }
    pub fn load_mesh(&mut self, stl_file: &[u8], orientation: JsValue) -> Result<JsValue, JsValue> {
        self.0.borrow_mut().load_mesh(stl_file, orientation)
    }
    pub fn set_target(&mut self, target: JsValue) -> Result<(), JsValue> {
        self.0.borrow_mut().set_target(target)
    }
    pub fn set_field_config(&mut self, config: JsValue) -> Result<(), JsValue> {
        self.0.borrow_mut().set_field_config(config)
    }
    /// Resolves to `true` if these fields became current,
    /// `false` if a newer image superseded them in the meantime.
    pub fn load_image(&mut self, img_file: Vec<u8>) -> js_sys::Promise {
        let inner = Rc::clone(&self.0);
        wasm_bindgen_futures::future_to_promise(async_load_image(inner, img_file))
    }
    pub fn bounding_box(&self) -> Result<JsValue, JsValue> {
        self.0.borrow().bounding_box()
    }
    pub fn placement(&self, face: &str, params: JsValue) -> Result<JsValue, JsValue> {
        self.0.borrow().placement(face, params)
    }
    pub fn camera(&self, padding: Option<f64>) -> Result<JsValue, JsValue> {
        self.0.borrow().camera(padding.unwrap_or(DEFAULT_PADDING))
    }
    pub fn displacement_png(&self) -> Result<Box<[u8]>, JsValue> {
        self.0.borrow().displacement_png()
    }
    pub fn normal_png(&self) -> Result<Box<[u8]>, JsValue> {
        self.0.borrow().normal_png()
    }
}

/// Decode and process an image without holding the state borrowed across awaits,
/// so that newer requests can start while this one is pending.
async fn async_load_image(
    mutself: Rc<RefCell<ReliefInner>>,
    img_file: Vec<u8>,
) -> Result<JsValue, JsValue> {
    let (ticket, config) = {
        let mut inner = mutself.borrow_mut();
        (inner.session.begin(), inner.field_config)
    };

    yield_to_host("decode").await;
    if !mutself.borrow().session.is_current(ticket) {
        return Ok(JsValue::FALSE);
    }
    let img = match field::decode_image(&img_file) {
        Ok(img) => img,
        Err(err) => return failed_build(&mutself, ticket, err),
    };

    yield_to_host("fields").await;
    if !mutself.borrow().session.is_current(ticket) {
        return Ok(JsValue::FALSE);
    }
    let fields = match field::build_fields(&img, &config) {
        Ok(fields) => fields,
        Err(err) => return failed_build(&mutself, ticket, err),
    };

    let accepted = mutself.borrow_mut().session.commit(ticket, fields);
    Ok(JsValue::from_bool(accepted))
}

/// A failure only matters for the latest request, and then the previous
/// fields no longer describe the current image.
fn failed_build(
    mutself: &Rc<RefCell<ReliefInner>>,
    ticket: BuildTicket,
    err: ReliefError,
) -> Result<JsValue, JsValue> {
    if mutself.borrow_mut().session.fail(ticket) {
        Err(utils::report_error(err))
    } else {
        log::debug!("Ignoring failure of superseded build: {}", err);
        Ok(JsValue::FALSE)
    }
}

struct ReliefInner {
    mesh: Option<MeshAsset>,
    target: DesignTarget,
    field_config: FieldConfig,
    session: FieldSession,
}

/// Extra per-frame arguments beside the relief parameters.
#[derive(Deserialize)]
#[serde(default)]
struct PlacementArgs {
    #[serde(flatten)]
    params: ReliefParams,
    margin: f64,
}

impl Default for PlacementArgs {
    fn default() -> Self {
        Self {
            params: ReliefParams::default(),
            margin: DEFAULT_MARGIN,
        }
    }
}

#[derive(Serialize)]
struct BoxOut {
    min: [f64; 3],
    max: [f64; 3],
    size: [f64; 3],
    scale: f64,
}

#[derive(Serialize)]
struct PlacementOut {
    face: String,
    position: [f64; 3],
    /// (x, y, z, w)
    quaternion: [f64; 4],
    width: f64,
    height: f64,
    displacement_scale: f64,
    mirror_u: bool,
    mirror_v: bool,
    rotate_by_90: bool,
    fit_scale: f64,
    overflows: bool,
}

#[derive(Serialize)]
struct CameraOut {
    position: [f64; 3],
    target: [f64; 3],
    near: f64,
    far: f64,
    min_distance: f64,
    max_distance: f64,
}

fn xyz(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn xyzw(q: &UnitQuaternion<f64>) -> [f64; 4] {
    let c = q.coords;
    [c.x, c.y, c.z, c.w]
}

impl ReliefInner {
    pub fn init() -> Self {
        utils::set_panic_hook();
        if utils::WasmLogger::init(log::LevelFilter::Info).is_err() {
            log::debug!("Logger already installed");
        }
        Self {
            mesh: None,
            target: DesignTarget::default(),
            field_config: FieldConfig::default(),
            session: FieldSession::new(),
        }
    }

    // Load the object, apply its orientation and the millimeter heuristic.
    pub fn load_mesh(&mut self, stl_file: &[u8], orientation: JsValue) -> Result<JsValue, JsValue> {
        let orientation: Orientation = if orientation.is_undefined() || orientation.is_null() {
            Orientation::default()
        } else {
            orientation.into_serde().map_err(utils::report_error)?
        };
        let mesh = mesh::read_stl(&mut Cursor::new(stl_file), &orientation)
            .map_err(utils::report_error)?;
        self.mesh = Some(mesh);
        self.bounding_box()
    }

    pub fn set_target(&mut self, target: JsValue) -> Result<(), JsValue> {
        self.target = target.into_serde().map_err(utils::report_error)?;
        log::info!(
            "Design target {} x {} mm on face {}",
            self.target.width_mm,
            self.target.height_mm,
            self.target.default_face
        );
        Ok(())
    }

    pub fn set_field_config(&mut self, config: JsValue) -> Result<(), JsValue> {
        self.field_config = config.into_serde().map_err(utils::report_error)?;
        Ok(())
    }

    fn mesh(&self) -> Result<&MeshAsset, JsValue> {
        self.mesh
            .as_ref()
            .ok_or_else(|| utils::report_error(anyhow!("No mesh loaded yet")))
    }

    pub fn bounding_box(&self) -> Result<JsValue, JsValue> {
        let mesh = self.mesh()?;
        let out = BoxOut {
            min: xyz(&mesh.bbox.min),
            max: xyz(&mesh.bbox.max),
            size: xyz(&Point3::from(mesh.bbox.size())),
            scale: mesh.scale,
        };
        JsValue::from_serde(&out).map_err(utils::report_error)
    }

    /// Per-frame composition, nothing is rebuilt here.
    pub fn placement(&self, face: &str, params: JsValue) -> Result<JsValue, JsValue> {
        let mesh = self.mesh()?;
        let face: FaceCode = if face.is_empty() {
            self.target.default_face
        } else {
            face.parse().map_err(utils::report_error)?
        };
        let args: PlacementArgs = if params.is_undefined() || params.is_null() {
            PlacementArgs::default()
        } else {
            params.into_serde().map_err(utils::report_error)?
        };

        let placement = face_placement(&mesh.bbox, face);
        let fit = self.target.plan_on(&mesh.bbox, face, args.margin);
        // Pixel offsets stay inert until an image has been processed.
        let field_size = self
            .session
            .fields()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        let plane = compose(&placement, &fit, &self.target, &args.params, field_size);

        let out = PlacementOut {
            face: face.to_string(),
            position: xyz(&plane.position),
            quaternion: xyzw(&plane.rotation),
            width: plane.width,
            height: plane.height,
            displacement_scale: plane.displacement_scale,
            mirror_u: plane.mirror_u,
            mirror_v: plane.mirror_v,
            rotate_by_90: fit.rotate_by_90,
            fit_scale: fit.scale,
            overflows: plane.overflows(&placement, args.margin),
        };
        JsValue::from_serde(&out).map_err(utils::report_error)
    }

    pub fn camera(&self, padding: f64) -> Result<JsValue, JsValue> {
        let frame = CameraFrame::framing(&self.mesh()?.bbox, padding);
        let out = CameraOut {
            position: xyz(&frame.position),
            target: xyz(&frame.target),
            near: frame.near,
            far: frame.far,
            min_distance: frame.min_distance,
            max_distance: frame.max_distance,
        };
        JsValue::from_serde(&out).map_err(utils::report_error)
    }

    pub fn displacement_png(&self) -> Result<Box<[u8]>, JsValue> {
        let fields = self.fields()?;
        log::info!("Encoding displacement map as PNG");
        let png = fields.displacement_png().map_err(utils::report_error)?;
        Ok(png.into_boxed_slice())
    }

    pub fn normal_png(&self) -> Result<Box<[u8]>, JsValue> {
        let fields = self.fields()?;
        log::info!("Encoding normal map as PNG");
        let png = fields.normal_png().map_err(utils::report_error)?;
        Ok(png.into_boxed_slice())
    }

    fn fields(&self) -> Result<&field::ReliefFields, JsValue> {
        self.session
            .fields()
            .ok_or_else(|| utils::report_error(anyhow!("No image processed yet")))
    }
}

//! Software render engine
//!
//! Keeps the same parameter model as a rigged character (base values,
//! expression blends, motion and gaze offsets, then per-frame additive
//! deltas clamped to each parameter's range) and draws a flat cartoon face
//! into an RGBA framebuffer. Used when no hardware renderer is attached and
//! as the engine behind the stream egress.

use std::collections::{BTreeMap, HashMap};
use std::f32::consts::TAU;
use std::path::Path;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use rand::Rng;

use super::catalog::{catalog_name, Catalog};
use super::manifest::{read_json, DisplayInfo, ExpressionFile, ModelManifest, ParameterBlend};
use super::{EngineError, ParameterInfo, RenderEngine, Result};

/// Parameters of a standard rig: (id, min, max, default)
const STANDARD_PARAMETERS: &[(&str, f32, f32, f32)] = &[
    ("ParamAngleX", -30.0, 30.0, 0.0),
    ("ParamAngleY", -30.0, 30.0, 0.0),
    ("ParamAngleZ", -30.0, 30.0, 0.0),
    ("ParamBodyAngleX", -10.0, 10.0, 0.0),
    ("ParamEyeLOpen", 0.0, 1.0, 1.0),
    ("ParamEyeROpen", 0.0, 1.0, 1.0),
    ("ParamEyeBallX", -1.0, 1.0, 0.0),
    ("ParamEyeBallY", -1.0, 1.0, 0.0),
    ("ParamMouthForm", -1.0, 1.0, 0.0),
    ("ParamMouthOpenY", 0.0, 1.0, 0.0),
    ("ParamA", 0.0, 1.0, 0.0),
    ("ParamI", 0.0, 1.0, 0.0),
    ("ParamU", 0.0, 1.0, 0.0),
    ("ParamE", 0.0, 1.0, 0.0),
    ("ParamO", 0.0, 1.0, 0.0),
    ("ParamCheek", 0.0, 1.0, 0.0),
];

const MOTION_LENGTH: Duration = Duration::from_secs(3);

/// Fraction of the remaining gaze distance covered per second
const GAZE_FOLLOW_RATE: f32 = 6.0;

const BACKGROUND: Rgba<u8> = Rgba([24, 26, 34, 255]);
const SKIN: Rgba<u8> = Rgba([240, 212, 190, 255]);
const BLUSH: Rgba<u8> = Rgba([236, 150, 150, 255]);
const FEATURE: Rgba<u8> = Rgba([40, 30, 36, 255]);
const MOUTH: Rgba<u8> = Rgba([150, 50, 60, 255]);

struct Slot {
    info: ParameterInfo,
    value: f32,
}

struct ActiveMotion {
    group: String,
    index: usize,
    priority: u32,
    elapsed: Duration,
}

pub struct HeadlessEngine {
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
    expressions: HashMap<String, Vec<(String, f32, ParameterBlend)>>,
    motion_groups: BTreeMap<String, usize>,
    expression: Option<String>,
    motion: Option<ActiveMotion>,
    look_target: Option<(f32, f32)>,
    gaze: (f32, f32),
    frame: RgbaImage,
    loaded: bool,
}

fn standard_parameter(id: &str) -> ParameterInfo {
    STANDARD_PARAMETERS
        .iter()
        .find(|(known, ..)| *known == id)
        .map(|&(id, min, max, default)| ParameterInfo::new(id, min, max, default))
        .unwrap_or_else(|| ParameterInfo::new(id, -1.0, 1.0, 0.0))
}

impl HeadlessEngine {
    /// Engine with a `width`x`height` framebuffer and no model loaded
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            expressions: HashMap::new(),
            motion_groups: BTreeMap::new(),
            expression: None,
            motion: None,
            look_target: None,
            gaze: (0.0, 0.0),
            frame: RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND),
            loaded: false,
        }
    }

    /// Engine with an in-memory rig instead of a model on disk
    pub fn with_parameters(width: u32, height: u32, parameters: Vec<ParameterInfo>) -> Self {
        let mut engine = Self::new(width, height);
        engine.set_parameters(parameters);
        engine.loaded = true;
        engine
    }

    pub fn define_expression(&mut self, name: &str, parameters: &[(&str, f32, ParameterBlend)]) {
        self.expressions.insert(
            name.to_string(),
            parameters
                .iter()
                .map(|&(id, value, blend)| (id.to_string(), value, blend))
                .collect(),
        );
    }

    pub fn define_motion_group(&mut self, name: &str, count: usize) {
        self.motion_groups.insert(name.to_string(), count.max(1));
    }

    pub fn parameter_value(&self, id: &str) -> Option<f32> {
        self.index.get(id).map(|&i| self.slots[i].value)
    }

    pub fn current_expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    pub fn active_motion(&self) -> Option<&str> {
        self.motion.as_ref().map(|m| m.group.as_str())
    }

    pub fn look_target(&self) -> Option<(f32, f32)> {
        self.look_target
    }

    pub fn expression_names(&self) -> Catalog {
        Catalog::new(self.expressions.keys().cloned())
    }

    pub fn motion_names(&self) -> Catalog {
        Catalog::new(self.motion_groups.keys().cloned())
    }

    fn set_parameters(&mut self, parameters: Vec<ParameterInfo>) {
        self.index.clear();
        self.slots.clear();
        for info in parameters {
            if self.index.contains_key(&info.id) {
                continue;
            }
            self.index.insert(info.id.clone(), self.slots.len());
            self.slots.push(Slot {
                value: info.default,
                info,
            });
        }
    }

    fn load_expression(&mut self, name: &str, path: &Path) {
        match read_json::<ExpressionFile>(path) {
            Ok(file) => {
                let params = file
                    .parameters
                    .into_iter()
                    .map(|p| (p.id, p.value, p.blend))
                    .collect();
                self.expressions.insert(name.to_string(), params);
            }
            Err(e) => log::warn!("skipping expression '{}': {}", name, e),
        }
    }

    fn value_or(&self, id: &str, fallback: f32) -> f32 {
        self.parameter_value(id).unwrap_or(fallback)
    }

    fn offset(&mut self, id: &str, amount: f32) {
        if let Some(&i) = self.index.get(id) {
            self.slots[i].value += amount;
        }
    }

    fn fill_rect(&mut self, cx: f32, cy: f32, half_w: f32, half_h: f32, color: Rgba<u8>) {
        let (w, h) = self.frame.dimensions();
        let x0 = (cx - half_w).floor().max(0.0) as u32;
        let y0 = (cy - half_h).floor().max(0.0) as u32;
        let x1 = ((cx + half_w).ceil().max(0.0) as u32).min(w);
        let y1 = ((cy + half_h).ceil().max(0.0) as u32).min(h);
        for y in y0..y1 {
            for x in x0..x1 {
                self.frame.put_pixel(x, y, color);
            }
        }
    }

    fn fill_disc(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        if radius <= 0.0 {
            return;
        }
        let (w, h) = self.frame.dimensions();
        let x0 = (cx - radius).floor().max(0.0) as u32;
        let y0 = (cy - radius).floor().max(0.0) as u32;
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(w);
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(h);
        let r2 = radius * radius;
        for y in y0..y1 {
            let dy = y as f32 + 0.5 - cy;
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r2 {
                    self.frame.put_pixel(x, y, color);
                }
            }
        }
    }
}

impl RenderEngine for HeadlessEngine {
    fn load_model(&mut self, manifest_path: &Path) -> Result<()> {
        let manifest = ModelManifest::load(manifest_path)?;
        let base = ModelManifest::base_dir(manifest_path);
        let refs = manifest.file_references;

        let parameters = match &refs.display_info {
            Some(file) => match read_json::<DisplayInfo>(&base.join(file)) {
                Ok(info) if !info.parameters.is_empty() => info
                    .parameters
                    .iter()
                    .map(|p| standard_parameter(&p.id))
                    .collect(),
                Ok(_) => STANDARD_PARAMETERS
                    .iter()
                    .map(|(id, ..)| standard_parameter(id))
                    .collect(),
                Err(e) => {
                    log::warn!("display info unusable, using standard rig: {}", e);
                    STANDARD_PARAMETERS
                        .iter()
                        .map(|(id, ..)| standard_parameter(id))
                        .collect()
                }
            },
            None => STANDARD_PARAMETERS
                .iter()
                .map(|(id, ..)| standard_parameter(id))
                .collect(),
        };
        self.set_parameters(parameters);

        self.expressions.clear();
        for exp in &refs.expressions {
            self.load_expression(&exp.name, &base.join(&exp.file));
        }
        if let Ok(entries) = std::fs::read_dir(base.join("expressions")) {
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                let name = catalog_name(file_name).to_string();
                if !name.is_empty() && !self.expressions.contains_key(&name) {
                    self.load_expression(&name, &entry.path());
                }
            }
        }

        self.motion_groups.clear();
        for (group, motions) in &refs.motions {
            self.motion_groups
                .insert(group.clone(), motions.len().max(1));
        }
        if let Ok(entries) = std::fs::read_dir(base.join("motions")) {
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                let name = catalog_name(file_name);
                if !name.is_empty() {
                    self.motion_groups.entry(name.to_string()).or_insert(1);
                }
            }
        }

        self.expression = None;
        self.motion = None;
        self.loaded = true;
        log::info!(
            "model {} loaded: {} parameters, {} expressions, {} motion groups",
            manifest_path.display(),
            self.slots.len(),
            self.expressions.len(),
            self.motion_groups.len()
        );
        Ok(())
    }

    fn list_parameters(&self) -> Vec<ParameterInfo> {
        self.slots.iter().map(|s| s.info.clone()).collect()
    }

    fn apply_expression(&mut self, name: &str) -> Result<()> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        if !self.expressions.contains_key(name) {
            return Err(EngineError::UnknownExpression(name.to_string()));
        }
        self.expression = Some(name.to_string());
        Ok(())
    }

    fn add_parameter_delta(&mut self, id: &str, value: f32) -> Result<()> {
        let i = *self
            .index
            .get(id)
            .ok_or_else(|| EngineError::UnknownParameter(id.to_string()))?;
        if !value.is_finite() {
            return Ok(());
        }
        let slot = &mut self.slots[i];
        slot.value = slot.info.clamp(slot.value + value);
        Ok(())
    }

    fn start_motion(&mut self, group: &str, priority: u32) -> Result<()> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        let count = *self
            .motion_groups
            .get(group)
            .ok_or_else(|| EngineError::UnknownMotion(group.to_string()))?;
        if let Some(active) = &self.motion {
            if active.priority > priority {
                log::debug!(
                    "motion '{}' ({}) outranked by '{}' ({})",
                    group,
                    priority,
                    active.group,
                    active.priority
                );
                return Ok(());
            }
        }
        let index = rand::rng().random_range(0..count);
        self.motion = Some(ActiveMotion {
            group: group.to_string(),
            index,
            priority,
            elapsed: Duration::ZERO,
        });
        Ok(())
    }

    fn set_look_target(&mut self, x: f32, y: f32) {
        self.look_target = Some((x, y));
    }

    fn update(&mut self, dt: Duration) {
        for slot in &mut self.slots {
            slot.value = slot.info.default;
        }

        if let Some(name) = &self.expression {
            if let Some(params) = self.expressions.get(name) {
                for (id, value, blend) in params {
                    if let Some(&i) = self.index.get(id) {
                        let slot = &mut self.slots[i];
                        slot.value = blend.apply(slot.value, *value);
                    }
                }
            }
        }

        let mut finished = false;
        let sway = match &mut self.motion {
            Some(motion) => {
                motion.elapsed += dt;
                if motion.elapsed >= MOTION_LENGTH {
                    finished = true;
                    None
                } else {
                    let phase = motion.elapsed.as_secs_f32() / MOTION_LENGTH.as_secs_f32();
                    let offset = motion.index as f32 * 0.25;
                    Some((phase * TAU + offset * TAU).sin() * (phase * TAU * 0.5).sin())
                }
            }
            None => None,
        };
        if finished {
            self.motion = None;
        }
        if let Some(sway) = sway {
            self.offset("ParamAngleZ", sway * 10.0);
            self.offset("ParamBodyAngleX", sway * 5.0);
        }

        let (w, h) = self.frame.dimensions();
        let target = match self.look_target {
            Some((x, y)) => (
                ((x / w as f32) * 2.0 - 1.0).clamp(-1.0, 1.0),
                (1.0 - (y / h as f32) * 2.0).clamp(-1.0, 1.0),
            ),
            None => (0.0, 0.0),
        };
        let follow = (dt.as_secs_f32() * GAZE_FOLLOW_RATE).min(1.0);
        self.gaze.0 += (target.0 - self.gaze.0) * follow;
        self.gaze.1 += (target.1 - self.gaze.1) * follow;
        let (gx, gy) = self.gaze;
        self.offset("ParamAngleX", gx * 30.0);
        self.offset("ParamAngleY", gy * 30.0);
        self.offset("ParamBodyAngleX", gx * 10.0);
        self.offset("ParamEyeBallX", gx);
        self.offset("ParamEyeBallY", gy);

        for slot in &mut self.slots {
            slot.value = slot.info.clamp(slot.value);
        }
    }

    fn draw(&mut self) {
        for pixel in self.frame.pixels_mut() {
            *pixel = BACKGROUND;
        }

        let (w, h) = self.frame.dimensions();
        let (w, h) = (w as f32, h as f32);
        let radius = w.min(h) * 0.3;
        let cx = w * 0.5 + self.value_or("ParamAngleX", 0.0) / 30.0 * w * 0.08;
        let cy = h * 0.42 - self.value_or("ParamAngleY", 0.0) / 30.0 * h * 0.05;
        self.fill_disc(cx, cy, radius, SKIN);

        let cheek = self.value_or("ParamCheek", 0.0);
        if cheek > 0.0 {
            let r = radius * 0.12 * cheek;
            self.fill_disc(cx - radius * 0.55, cy + radius * 0.15, r, BLUSH);
            self.fill_disc(cx + radius * 0.55, cy + radius * 0.15, r, BLUSH);
        }

        let eye_y = cy - radius * 0.2;
        let eye_shift = self.value_or("ParamEyeBallX", 0.0) * radius * 0.05;
        let eye_lift = self.value_or("ParamEyeBallY", 0.0) * radius * 0.05;
        let left_open = self.value_or("ParamEyeLOpen", 1.0);
        let right_open = self.value_or("ParamEyeROpen", 1.0);
        self.fill_disc(
            cx - radius * 0.4 + eye_shift,
            eye_y - eye_lift,
            radius * 0.1 * left_open.max(0.15),
            FEATURE,
        );
        self.fill_disc(
            cx + radius * 0.4 + eye_shift,
            eye_y - eye_lift,
            radius * 0.1 * right_open.max(0.15),
            FEATURE,
        );

        let open = self.value_or("ParamMouthOpenY", 0.0).clamp(0.0, 1.0);
        let form = self.value_or("ParamMouthForm", 0.0).clamp(-1.0, 1.0);
        let half_w = radius * (0.25 + 0.1 * form);
        let half_h = (radius * (0.02 + 0.2 * open)).max(1.0);
        self.fill_rect(cx, cy + radius * 0.45, half_w, half_h, MOUTH);
    }

    fn frame(&self) -> &RgbaImage {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> HeadlessEngine {
        HeadlessEngine::with_parameters(
            200,
            300,
            STANDARD_PARAMETERS
                .iter()
                .map(|(id, ..)| standard_parameter(id))
                .collect(),
        )
    }

    #[test]
    fn test_delta_clamps_and_resets_on_update() {
        let mut engine = rig();
        engine.add_parameter_delta("ParamMouthOpenY", 0.4).unwrap();
        engine.add_parameter_delta("ParamMouthOpenY", 0.9).unwrap();
        assert_eq!(engine.parameter_value("ParamMouthOpenY"), Some(1.0));

        engine.update(Duration::from_millis(16));
        assert_eq!(engine.parameter_value("ParamMouthOpenY"), Some(0.0));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut engine = rig();
        assert!(matches!(
            engine.add_parameter_delta("ParamTail", 1.0),
            Err(EngineError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_expression_blends_apply_on_update() {
        let mut engine = rig();
        engine.define_expression(
            "smile",
            &[
                ("ParamMouthForm", 1.0, ParameterBlend::Add),
                ("ParamEyeLOpen", 0.5, ParameterBlend::Multiply),
                ("ParamCheek", 0.7, ParameterBlend::Overwrite),
            ],
        );
        engine.apply_expression("smile").unwrap();
        engine.update(Duration::from_millis(16));

        assert_eq!(engine.current_expression(), Some("smile"));
        assert_eq!(engine.parameter_value("ParamMouthForm"), Some(1.0));
        assert_eq!(engine.parameter_value("ParamEyeLOpen"), Some(0.5));
        assert_eq!(engine.parameter_value("ParamCheek"), Some(0.7));
    }

    #[test]
    fn test_unknown_expression_keeps_current() {
        let mut engine = rig();
        engine.define_expression("normal", &[]);
        engine.apply_expression("normal").unwrap();
        assert!(matches!(
            engine.apply_expression("furious"),
            Err(EngineError::UnknownExpression(_))
        ));
        assert_eq!(engine.current_expression(), Some("normal"));
    }

    #[test]
    fn test_unloaded_engine_rejects_expression() {
        let mut engine = HeadlessEngine::new(10, 10);
        assert!(matches!(
            engine.apply_expression("normal"),
            Err(EngineError::NotLoaded)
        ));
    }

    #[test]
    fn test_motion_priority() {
        let mut engine = rig();
        engine.define_motion_group("Idle", 2);
        engine.define_motion_group("TapBody", 1);

        engine.start_motion("TapBody", 3).unwrap();
        engine.start_motion("Idle", 1).unwrap();
        assert_eq!(engine.active_motion(), Some("TapBody"));

        engine.start_motion("Idle", 3).unwrap();
        assert_eq!(engine.active_motion(), Some("Idle"));

        // motions run out on their own
        engine.update(MOTION_LENGTH + Duration::from_millis(1));
        assert_eq!(engine.active_motion(), None);
    }

    #[test]
    fn test_look_target_turns_head() {
        let mut engine = rig();
        engine.set_look_target(200.0 * 0.8, 150.0);
        for _ in 0..120 {
            engine.update(Duration::from_millis(16));
        }
        let angle = engine.parameter_value("ParamAngleX").unwrap();
        assert!(angle > 15.0, "head should turn right, got {}", angle);
        assert!(engine.parameter_value("ParamAngleY").unwrap().abs() < 1.0);
    }

    #[test]
    fn test_open_mouth_draws_more_mouth_pixels() {
        let count_mouth = |engine: &HeadlessEngine| {
            engine.frame().pixels().filter(|p| **p == MOUTH).count()
        };

        let mut engine = rig();
        engine.update(Duration::from_millis(16));
        engine.draw();
        let closed = count_mouth(&engine);

        engine.add_parameter_delta("ParamMouthOpenY", 1.0).unwrap();
        engine.draw();
        let open = count_mouth(&engine);

        assert!(closed > 0);
        assert!(open > closed * 3, "closed={} open={}", closed, open);
        assert_eq!(engine.frame().dimensions(), (200, 300));
    }

    #[test]
    fn test_load_model_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("expressions")).unwrap();
        std::fs::create_dir(root.join("motions")).unwrap();
        std::fs::write(
            root.join("Test.model3.json"),
            r#"{
                "Version": 3,
                "FileReferences": {
                    "DisplayInfo": "Test.cdi3.json",
                    "Motions": {"Idle": [{"File": "motions/idle.motion3.json"}]}
                }
            }"#,
        )
        .unwrap();
        std::fs::write(
            root.join("Test.cdi3.json"),
            r#"{"Parameters": [
                {"Id": "ParamMouthOpenY", "GroupId": "", "Name": "Mouth Open"},
                {"Id": "ParamHairFront", "GroupId": "", "Name": "Hair"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(
            root.join("expressions/normal.exp3.json"),
            r#"{"Parameters": []}"#,
        )
        .unwrap();
        std::fs::write(
            root.join("expressions/smile.exp3.json"),
            r#"{"Parameters": [{"Id": "ParamMouthForm", "Value": 1}]}"#,
        )
        .unwrap();
        std::fs::write(root.join("motions/idle.motion3.json"), "{}").unwrap();
        std::fs::write(root.join("motions/wave.motion3.json"), "{}").unwrap();

        let mut engine = HeadlessEngine::new(64, 64);
        engine.load_model(&root.join("Test.model3.json")).unwrap();

        let ids: Vec<String> = engine.list_parameters().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, ["ParamMouthOpenY", "ParamHairFront"]);
        assert_eq!(engine.expression_names().names(), ["normal", "smile"]);
        assert_eq!(engine.motion_names().names(), ["Idle", "idle", "wave"]);
        engine.apply_expression("smile").unwrap();
        engine.start_motion("wave", 1).unwrap();
    }

    #[test]
    fn test_load_model_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = HeadlessEngine::new(64, 64);
        assert!(matches!(
            engine.load_model(&dir.path().join("none.model3.json")),
            Err(EngineError::Io { .. })
        ));
    }
}

//! Bookmarked views persisted as `id=record` lines.
//!
//! Record format: `name|zoomScale|centerX|centerY|id2|id3|`, keyed by the first id.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::{BigFloat, Viewport};

/// Ids held by every view (one per UI widget it owns).
pub const VIEW_ID_COUNT: usize = 3;

const INVALID_ID: i32 = -1;

/// djb2 string hash with 32-bit wrapping.
pub fn hash_djb2(s: &str) -> i32 {
    s.bytes().fold(5381i32, |hash, c| {
        hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(c as i32)
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct SavedView {
    name: String,
    zoom_scale: String,
    center_x: String,
    center_y: String,
    ids: [i32; VIEW_ID_COUNT],
}

impl SavedView {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i32 {
        self.ids[0]
    }

    pub fn ids(&self) -> &[i32; VIEW_ID_COUNT] {
        &self.ids
    }

    pub fn zoom_scale(&self) -> &str {
        &self.zoom_scale
    }

    pub fn center(&self) -> (&str, &str) {
        (&self.center_x, &self.center_y)
    }

    /// Viewport showing this view in a window of the given size.
    pub fn viewport(&self, window_width: u32, window_height: u32) -> Result<Viewport, CoreError> {
        Viewport::from_strings(
            window_width,
            window_height,
            &self.zoom_scale,
            &self.center_x,
            &self.center_y,
        )
    }

    /// Record text stored after `id=`.
    pub fn to_record(&self) -> String {
        let mut record = format!(
            "{}|{}|{}|{}|",
            self.name, self.zoom_scale, self.center_x, self.center_y
        );
        for id in &self.ids[1..] {
            record.push_str(&id.to_string());
            record.push('|');
        }
        record
    }

    pub fn parse(first_id: i32, record: &str) -> Result<Self, CoreError> {
        let malformed = || CoreError::SavedViewFormat(record.to_string());
        let mut fields = record.split('|');

        let name = fields.next().ok_or_else(malformed)?.to_string();
        let mut number = || -> Result<String, CoreError> {
            let text = fields.next().ok_or_else(malformed)?.trim().to_string();
            BigFloat::from_string(&text, 128)?;
            Ok(text)
        };
        let zoom_scale = number()?;
        let center_x = number()?;
        let center_y = number()?;

        let mut ids = [INVALID_ID; VIEW_ID_COUNT];
        ids[0] = first_id;
        let mut rest = record.split('|').skip(4).filter(|f| !f.trim().is_empty());
        for slot in ids.iter_mut().skip(1) {
            if let Some(text) = rest.next() {
                *slot = text.trim().parse().map_err(|_| malformed())?;
            }
        }

        Ok(Self {
            name,
            zoom_scale,
            center_x,
            center_y,
            ids,
        })
    }
}

/// Name built from the view's position: `x + y i (zoom)`.
pub fn generic_name(viewport: &Viewport) -> String {
    format!(
        "{:.5} + {:.5} i ({:.5e})",
        viewport.center.0.to_f64(),
        viewport.center.1.to_f64(),
        viewport.zoom_scale.to_f64()
    )
}

fn sanitize_name(name: &str) -> String {
    name.replace('|', "")
}

/// All saved views and the file they live in.
#[derive(Debug)]
pub struct SavedViews {
    path: PathBuf,
    views: Vec<SavedView>,
}

impl SavedViews {
    /// Load from `path`; a missing file means no views yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(CoreError::Io { path, source }),
        };

        let mut views = Vec::new();
        for line in text.lines().map(str::trim) {
            let Some((id, record)) = line.split_once('=') else {
                continue;
            };
            let Ok(id) = id.trim().parse::<i32>() else {
                log::warn!("skipping saved view with invalid id: {}", line);
                continue;
            };
            match SavedView::parse(id, record) {
                Ok(view) => views.push(view),
                Err(e) => log::warn!("skipping saved view: {}", e),
            }
        }
        log::debug!("loaded {} saved views from {}", views.len(), path.display());
        Ok(Self { path, views })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn views(&self) -> &[SavedView] {
        &self.views
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&SavedView> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn get(&self, id: i32) -> Option<&SavedView> {
        self.views.iter().find(|v| v.id() == id)
    }

    fn used_ids(&self) -> HashSet<i32> {
        self.views.iter().flat_map(|v| v.ids).collect()
    }

    /// Save the current view under `name` (a generic name when empty) and persist.
    pub fn save_new(&mut self, name: &str, viewport: &Viewport) -> Result<&SavedView, CoreError> {
        let name = match sanitize_name(name) {
            n if n.trim().is_empty() => generic_name(viewport),
            n => n,
        };

        let mut used = self.used_ids();
        let mut ids = [INVALID_ID; VIEW_ID_COUNT];
        for slot in ids.iter_mut() {
            let id = next_free_id(&name, &used);
            used.insert(id);
            *slot = id;
        }

        self.views.push(SavedView {
            name,
            zoom_scale: viewport.zoom_scale.to_string(),
            center_x: viewport.center.0.to_string(),
            center_y: viewport.center.1.to_string(),
            ids,
        });
        self.persist()?;
        let index = self.views.len() - 1;
        Ok(&self.views[index])
    }

    pub fn rename(&mut self, id: i32, name: &str) -> Result<(), CoreError> {
        let view = self
            .views
            .iter_mut()
            .find(|v| v.id() == id)
            .ok_or_else(|| CoreError::UnknownView(id.to_string()))?;
        view.name = sanitize_name(name);
        self.persist()
    }

    pub fn remove(&mut self, id: i32) -> Result<SavedView, CoreError> {
        let index = self
            .views
            .iter()
            .position(|v| v.id() == id)
            .ok_or_else(|| CoreError::UnknownView(id.to_string()))?;
        let removed = self.views.remove(index);
        self.persist()?;
        Ok(removed)
    }

    pub fn remove_by_name(&mut self, name: &str) -> Result<SavedView, CoreError> {
        let id = self
            .find(name)
            .map(SavedView::id)
            .ok_or_else(|| CoreError::UnknownView(name.to_string()))?;
        self.remove(id)
    }

    /// Move `viewport` to the named view, keeping its window size.
    pub fn jump_to(&self, name: &str, viewport: &mut Viewport) -> Result<(), CoreError> {
        let view = self
            .find(name)
            .ok_or_else(|| CoreError::UnknownView(name.to_string()))?;
        *viewport = view.viewport(viewport.window_width, viewport.window_height)?;
        Ok(())
    }

    fn persist(&self) -> Result<(), CoreError> {
        let io_err = |source| CoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text: String = self
            .views
            .iter()
            .map(|v| format!("{}={}\n", v.id(), v.to_record()))
            .collect();
        std::fs::write(&self.path, text).map_err(io_err)
    }
}

/// djb2 of `seed`, then the first free id probing upward.
///
/// At most `used.len() + 1` candidates are probed, so this always terminates.
fn next_free_id(seed: &str, used: &HashSet<i32>) -> i32 {
    let start = hash_djb2(seed);
    (0..=used.len() as i32 + 1)
        .map(|k| start.wrapping_add(k))
        .find(|id| *id != INVALID_ID && !used.contains(id))
        .unwrap_or(start)
}

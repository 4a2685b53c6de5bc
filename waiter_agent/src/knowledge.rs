//! The persisted logic program and its rewritable regions.
//!
//! The artifact is parsed once into fixed text, three marker-delimited
//! regions and the step-horizon directive. Mutations only touch the
//! in-memory copy; the file is rewritten as a whole on [`KnowledgeStore::flush`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Observations,
    Goals,
    InitialSituation,
}

impl Region {
    pub const ALL: [Region; 3] = [
        Region::Observations,
        Region::Goals,
        Region::InitialSituation,
    ];

    pub fn begin_marker(self) -> &'static str {
        match self {
            Region::Observations => "%b_obs",
            Region::Goals => "%b_goal",
            Region::InitialSituation => "%b_init",
        }
    }

    pub fn end_marker(self) -> &'static str {
        match self {
            Region::Observations => "%e_obs",
            Region::Goals => "%e_goal",
            Region::InitialSituation => "%e_init",
        }
    }

    fn opened_by(line: &str) -> Option<Region> {
        let line = line.trim_start();
        Region::ALL
            .into_iter()
            .find(|region| line.starts_with(region.begin_marker()))
    }

    fn is_closed_by(self, line: &str) -> bool {
        line.trim_start().starts_with(self.end_marker())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Observations => "observations",
            Region::Goals => "goals",
            Region::InitialSituation => "initial-situation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("region {0} not found (missing begin/end markers)")]
    RegionNotFound(Region),
    #[error("step horizon directive `#const {0} = <n>.` not found")]
    DirectiveNotFound(String),
    #[error("invalid horizon constant name: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to access knowledge artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Body(Region),
    Horizon,
}

/// A line between a region's markers. Comment lines are documentation and
/// survive clearing; everything else is data.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RegionLine {
    Comment(String),
    Data(String),
}

impl RegionLine {
    fn classify(line: &str) -> Self {
        if line.trim_start().starts_with('%') {
            RegionLine::Comment(line.to_owned())
        } else {
            RegionLine::Data(line.to_owned())
        }
    }
}

pub struct KnowledgeStore {
    path: PathBuf,
    horizon_constant: String,
    directive: Regex,
    segments: Vec<Segment>,
    regions: HashMap<Region, Vec<RegionLine>>,
    horizon: Option<String>,
    dirty: bool,
}

impl KnowledgeStore {
    /// Read and parse the artifact at `path`.
    pub async fn open(
        path: impl Into<PathBuf>,
        horizon_constant: &str,
    ) -> Result<Self, KnowledgeError> {
        let path = path.into();
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| KnowledgeError::Io {
                path: path.clone(),
                source,
            })?;
        let mut store = Self::from_text(path, horizon_constant, &text)?;
        store.dirty = false;
        Ok(store)
    }

    /// Parse program text that will be written to `path` on the next flush.
    pub fn from_text(
        path: impl Into<PathBuf>,
        horizon_constant: &str,
        text: &str,
    ) -> Result<Self, KnowledgeError> {
        let directive = Regex::new(&format!(
            r"^\s*#const\s+{}\s*=\s*\d+\s*\.",
            regex::escape(horizon_constant)
        ))?;
        let mut store = Self {
            path: path.into(),
            horizon_constant: horizon_constant.to_owned(),
            directive,
            segments: Vec::new(),
            regions: HashMap::new(),
            horizon: None,
            dirty: true,
        };
        store.parse(text);
        Ok(store)
    }

    fn parse(&mut self, text: &str) {
        let mut open: Option<(Region, Vec<RegionLine>)> = None;

        for line in text.split_inclusive('\n') {
            if let Some((region, body)) = open.as_mut() {
                if region.is_closed_by(line) {
                    let region = *region;
                    let body = std::mem::take(body);
                    self.regions.insert(region, body);
                    self.segments.push(Segment::Body(region));
                    self.segments.push(Segment::Text(line.to_owned()));
                    open = None;
                } else {
                    body.push(RegionLine::classify(line));
                }
                continue;
            }

            match Region::opened_by(line) {
                Some(region) if !self.regions.contains_key(&region) => {
                    self.segments.push(Segment::Text(line.to_owned()));
                    open = Some((region, Vec::new()));
                }
                Some(region) => {
                    tracing::warn!(%region, "duplicate region markers, keeping the first region");
                    self.segments.push(Segment::Text(line.to_owned()));
                }
                None if self.horizon.is_none() && self.directive.is_match(line) => {
                    self.segments.push(Segment::Horizon);
                    self.horizon = Some(line.to_owned());
                }
                None => self.segments.push(Segment::Text(line.to_owned())),
            }
        }

        if let Some((region, body)) = open {
            tracing::warn!(%region, "region is never closed, treating it as fixed text");
            for line in body {
                let (RegionLine::Comment(text) | RegionLine::Data(text)) = line;
                self.segments.push(Segment::Text(text));
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_region(&self, region: Region) -> bool {
        self.regions.contains_key(&region)
    }

    /// Drop every data line of the region, keeping its comment lines.
    pub fn clear_region(&mut self, region: Region) -> Result<(), KnowledgeError> {
        let body = self
            .regions
            .get_mut(&region)
            .ok_or(KnowledgeError::RegionNotFound(region))?;
        let before = body.len();
        body.retain(|line| matches!(line, RegionLine::Comment(_)));
        if body.len() != before {
            self.dirty = true;
        }
        Ok(())
    }

    /// Append one clause per line right before the region's end marker.
    /// Existing content is kept: clear first for replace semantics.
    pub fn write_region<I, S>(&mut self, region: Region, clauses: I) -> Result<(), KnowledgeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = self
            .regions
            .get_mut(&region)
            .ok_or(KnowledgeError::RegionNotFound(region))?;
        for clause in clauses {
            body.push(RegionLine::Data(format!("{}\n", clause.as_ref().trim_end())));
            self.dirty = true;
        }
        Ok(())
    }

    /// Data lines of a region, without line endings.
    pub fn region_clauses(&self, region: Region) -> Result<Vec<&str>, KnowledgeError> {
        let body = self
            .regions
            .get(&region)
            .ok_or(KnowledgeError::RegionNotFound(region))?;
        Ok(body
            .iter()
            .filter_map(|line| match line {
                RegionLine::Data(text) => Some(text.trim_end_matches(['\r', '\n'])),
                RegionLine::Comment(_) => None,
            })
            .filter(|text| !text.trim().is_empty())
            .collect())
    }

    pub fn set_step_horizon(&mut self, horizon: u32) -> Result<(), KnowledgeError> {
        let line = self
            .horizon
            .as_mut()
            .ok_or_else(|| KnowledgeError::DirectiveNotFound(self.horizon_constant.clone()))?;
        let ending = if line.ends_with("\r\n") {
            "\r\n"
        } else if line.ends_with('\n') {
            "\n"
        } else {
            ""
        };
        let updated = format!("#const {} = {}.{}", self.horizon_constant, horizon, ending);
        if *line != updated {
            *line = updated;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn step_horizon(&self) -> Option<u32> {
        let line = self.horizon.as_deref()?;
        let (_, value) = line.split_once('=')?;
        value.trim().trim_end_matches('.').trim().parse().ok()
    }

    /// Empty all regions and set the horizon back to zero.
    pub fn reset(&mut self) -> Result<(), KnowledgeError> {
        for region in Region::ALL {
            self.clear_region(region)?;
        }
        self.set_step_horizon(0)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Horizon => {
                    if let Some(line) = &self.horizon {
                        out.push_str(line);
                    }
                }
                Segment::Body(region) => {
                    for line in self.regions.get(region).into_iter().flatten() {
                        let (RegionLine::Comment(text) | RegionLine::Data(text)) = line;
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }

    /// Rewrite the artifact if anything changed since the last flush.
    ///
    /// The new content goes to a sibling file first and is renamed over the
    /// artifact, so a reader never sees a half-written program.
    pub async fn flush(&mut self) -> Result<(), KnowledgeError> {
        if !self.dirty {
            return Ok(());
        }
        let staging = self.staging_path();
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| KnowledgeError::Io { path, source }
        };
        tokio::fs::write(&staging, self.render())
            .await
            .map_err(io_err(&staging))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(io_err(&self.path))?;
        self.dirty = false;
        tracing::trace!(path = %self.path.display(), "knowledge artifact flushed");
        Ok(())
    }

    /// Flush and release the artifact.
    pub async fn close(mut self) -> Result<(), KnowledgeError> {
        self.flush().await
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_owned());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("path", &self.path)
            .field("horizon", &self.step_horizon())
            .field("regions", &self.regions.keys().collect::<Vec<_>>())
            .field("dirty", &self.dirty)
            .finish()
    }
}

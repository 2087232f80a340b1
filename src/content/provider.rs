use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use rust_embed::Embed;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::content::{
    ChapterMeta, ContentError, ContentId, ContentProvider, ExamMeta, Question, parse_questions,
};

#[derive(Embed)]
#[folder = "assets/content/"]
struct BundledAssets;

#[derive(Deserialize, Default)]
struct ChapterIndex {
    #[serde(default)]
    chapters: Vec<ChapterMeta>,
}

#[derive(Deserialize, Default)]
struct ExamIndex {
    #[serde(default)]
    exams: Vec<ExamMeta>,
}

enum Source {
    Bundled,
    Dir(PathBuf),
}

/// Question library backed by the bundled assets or an on-disk content directory.
///
/// Both use the same layout: `chapters.json`, `exams.json`,
/// `questions-chapter-<n>.json` and `exam-<n>.json`.
pub struct ContentLibrary {
    source: Source,
}

impl ContentLibrary {
    pub fn bundled() -> Self {
        Self {
            source: Source::Bundled,
        }
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Dir(dir.into()),
        }
    }

    fn read(&self, name: &str) -> io::Result<Option<String>> {
        match &self.source {
            Source::Bundled => match BundledAssets::get(name) {
                Some(file) => String::from_utf8(file.data.into_owned())
                    .map(Some)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
                None => Ok(None),
            },
            Source::Dir(dir) => {
                let path = dir.join(name);
                if path.exists() {
                    fs::read_to_string(path).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn load_index<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        match self.read(name) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable {name}: {e}");
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                log::warn!("failed to read {name}: {e}");
                T::default()
            }
        }
    }
}

impl ContentProvider for ContentLibrary {
    fn chapters(&self) -> Vec<ChapterMeta> {
        self.load_index::<ChapterIndex>("chapters.json").chapters
    }

    fn exams(&self) -> Vec<ExamMeta> {
        self.load_index::<ExamIndex>("exams.json").exams
    }

    fn load(&self, id: ContentId) -> Result<Vec<Question>, ContentError> {
        if let ContentId::Chapter(_) = id {
            let chapters = self.chapters();
            let key = id.to_string();
            match chapters.iter().find(|c| c.id == key) {
                Some(meta) if meta.is_coming_soon => return Err(ContentError::ComingSoon(id)),
                None if !chapters.is_empty() => return Err(ContentError::NotFound(id)),
                _ => {}
            }
        }

        let raw = self
            .read(&id.file_name())
            .map_err(|source| ContentError::Io { id, source })?
            .ok_or(ContentError::NotFound(id))?;
        let questions = parse_questions(id, &raw)?;
        log::info!("loaded {} questions for {id}", questions.len());
        Ok(questions)
    }
}

/// In-memory provider, mostly useful for tests and scripted sessions.
#[derive(Default)]
pub struct MemoryContent {
    pub chapters: Vec<ChapterMeta>,
    pub exams: Vec<ExamMeta>,
    pools: HashMap<ContentId, Vec<Question>>,
}

impl MemoryContent {
    pub fn with_pool(mut self, id: ContentId, questions: Vec<Question>) -> Self {
        match id {
            ContentId::Chapter(_) => self.chapters.push(ChapterMeta {
                id: id.to_string(),
                title: id.to_string(),
                description: String::new(),
                is_coming_soon: false,
            }),
            ContentId::Exam(_) => self.exams.push(ExamMeta {
                id: id.to_string(),
                title: id.to_string(),
                description: String::new(),
                duration_minutes: None,
            }),
        }
        self.pools.insert(id, questions);
        self
    }
}

impl ContentProvider for MemoryContent {
    fn chapters(&self) -> Vec<ChapterMeta> {
        self.chapters.clone()
    }

    fn exams(&self) -> Vec<ExamMeta> {
        self.exams.clone()
    }

    fn load(&self, id: ContentId) -> Result<Vec<Question>, ContentError> {
        match self.pools.get(&id) {
            Some(q) if q.is_empty() => Err(ContentError::Empty(id)),
            Some(q) => Ok(q.clone()),
            None => Err(ContentError::NotFound(id)),
        }
    }
}

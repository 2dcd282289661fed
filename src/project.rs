use std::path::PathBuf;
use uuid::Uuid;

/// Single open tile map editing session.
pub struct Session {
    pub id: Uuid,
    /// `None` for unsaved/untitled maps.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Session {
    pub fn new_untitled(untitled_counter: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    pub fn from_file(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        Self { id: Uuid::new_v4(), path: Some(path), is_dirty: false, name }
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_flag_shows_in_title() {
        let mut session = Session::new_untitled(1);
        assert_eq!(session.display_title(), "Untitled-1");
        session.mark_dirty();
        assert_eq!(session.display_title(), "Untitled-1*");
        session.mark_clean();
        assert_eq!(session.display_title(), "Untitled-1");
    }

    #[test]
    fn name_derives_from_path() {
        let session = Session::from_file(PathBuf::from("/maps/dungeon.json"));
        assert_eq!(session.name, "dungeon.json");
    }
}

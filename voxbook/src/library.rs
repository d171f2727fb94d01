//! Library store: books, reading positions, and bookmarks.
//!
//! The whole catalog lives in one JSON file. Every mutation rewrites
//! the file; with a personal library of at most a few hundred books
//! that is simpler and safer than partial updates.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

/// A book registered in the library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: u64,
    pub title: String,
    /// Path of the source file the book was imported from.
    pub path: PathBuf,
    /// Resume point as a character offset into the parsed content.
    pub last_position: usize,
    pub created_at: DateTime<Utc>,
}

/// A saved location inside a book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub id: u64,
    pub book_id: u64,
    /// Character offset into the parsed content.
    pub position: usize,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LibraryData {
    next_id: u64,
    books: Vec<Book>,
    bookmarks: Vec<Bookmark>,
}

/// The on-disk library.
pub struct Library {
    path: PathBuf,
    data: LibraryData,
}

impl Library {
    /// Open the library at `path`, creating an empty one if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let data = if path.exists() {
            let file = File::open(&path)
                .with_context(|| format!("failed to open library file {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse library file {}", path.display()))?
        } else {
            LibraryData {
                next_id: 1,
                ..LibraryData::default()
            }
        };

        Ok(Self { path, data })
    }

    /// Open the library at its default location under the platform
    /// data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(default_library_path()?)
    }

    /// Register a book and return it. The position starts at the
    /// beginning.
    pub fn add_book(&mut self, title: impl Into<String>, path: impl Into<PathBuf>) -> Result<Book> {
        let book = Book {
            id: self.data.next_id,
            title: title.into(),
            path: path.into(),
            last_position: 0,
            created_at: Utc::now(),
        };
        self.data.next_id += 1;
        self.data.books.push(book.clone());
        self.save()?;
        Ok(book)
    }

    pub fn get_book(&self, id: u64) -> Option<&Book> {
        self.data.books.iter().find(|b| b.id == id)
    }

    /// All books, newest first.
    pub fn all_books(&self) -> Vec<&Book> {
        let mut books: Vec<&Book> = self.data.books.iter().collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        books
    }

    /// Record the resume position for a book.
    pub fn update_position(&mut self, id: u64, position: usize) -> Result<()> {
        let book = self
            .data
            .books
            .iter_mut()
            .find(|b| b.id == id)
            .with_context(|| format!("no book with id {id}"))?;
        book.last_position = position;
        self.save()
    }

    /// Remove a book and all of its bookmarks.
    pub fn delete_book(&mut self, id: u64) -> Result<()> {
        let before = self.data.books.len();
        self.data.books.retain(|b| b.id != id);
        if self.data.books.len() == before {
            anyhow::bail!("no book with id {id}");
        }
        self.data.bookmarks.retain(|m| m.book_id != id);
        self.save()
    }

    /// Save a bookmark in a book.
    pub fn add_bookmark(
        &mut self,
        book_id: u64,
        position: usize,
        note: Option<String>,
    ) -> Result<Bookmark> {
        if self.get_book(book_id).is_none() {
            anyhow::bail!("no book with id {book_id}");
        }
        let bookmark = Bookmark {
            id: self.data.next_id,
            book_id,
            position,
            note,
            created_at: Utc::now(),
        };
        self.data.next_id += 1;
        self.data.bookmarks.push(bookmark.clone());
        self.save()?;
        Ok(bookmark)
    }

    /// Bookmarks for a book, ordered by position.
    pub fn bookmarks(&self, book_id: u64) -> Vec<&Bookmark> {
        let mut marks: Vec<&Bookmark> = self
            .data
            .bookmarks
            .iter()
            .filter(|m| m.book_id == book_id)
            .collect();
        marks.sort_by_key(|m| m.position);
        marks
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("failed to write library file {}", self.path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.data)
            .context("failed to serialize library")?;
        Ok(())
    }
}

/// Default library file location under the platform data directory.
pub fn default_library_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("voxbook"))
        .ok_or_else(|| anyhow::anyhow!("could not determine data directory"))?;
    Ok(data_dir.join("library.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_library() -> (TempDir, Library) {
        let dir = TempDir::new().unwrap();
        let library = Library::open(dir.path().join("library.json")).unwrap();
        (dir, library)
    }

    #[test]
    fn test_add_and_get_book() {
        let (_dir, mut library) = temp_library();

        let book = library.add_book("Dom Casmurro", "/books/dom-casmurro.epub").unwrap();
        assert_eq!(book.id, 1);
        assert_eq!(book.last_position, 0);

        let fetched = library.get_book(book.id).unwrap();
        assert_eq!(fetched.title, "Dom Casmurro");
        assert!(library.get_book(99).is_none());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let (_dir, mut library) = temp_library();

        let first = library.add_book("One", "/books/one.txt").unwrap();
        library.delete_book(first.id).unwrap();
        let second = library.add_book("Two", "/books/two.txt").unwrap();

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_update_position_persists() {
        let (dir, mut library) = temp_library();

        let book = library.add_book("Quincas Borba", "/books/quincas.txt").unwrap();
        library.update_position(book.id, 4711).unwrap();

        // Reopen from disk.
        let reloaded = Library::open(dir.path().join("library.json")).unwrap();
        assert_eq!(reloaded.get_book(book.id).unwrap().last_position, 4711);
    }

    #[test]
    fn test_update_position_unknown_book() {
        let (_dir, mut library) = temp_library();
        assert!(library.update_position(42, 0).is_err());
    }

    #[test]
    fn test_delete_book_removes_bookmarks() {
        let (_dir, mut library) = temp_library();

        let book = library.add_book("Memórias Póstumas", "/books/bras-cubas.epub").unwrap();
        library.add_bookmark(book.id, 120, Some("chapter 2".to_string())).unwrap();
        library.add_bookmark(book.id, 900, None).unwrap();
        assert_eq!(library.bookmarks(book.id).len(), 2);

        library.delete_book(book.id).unwrap();
        assert!(library.get_book(book.id).is_none());
        assert!(library.bookmarks(book.id).is_empty());
    }

    #[test]
    fn test_bookmarks_ordered_by_position() {
        let (_dir, mut library) = temp_library();

        let book = library.add_book("Iaiá Garcia", "/books/iaia.txt").unwrap();
        library.add_bookmark(book.id, 500, None).unwrap();
        library.add_bookmark(book.id, 10, None).unwrap();
        library.add_bookmark(book.id, 250, None).unwrap();

        let positions: Vec<usize> = library.bookmarks(book.id).iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![10, 250, 500]);
    }

    #[test]
    fn test_bookmarks_get_distinct_ids() {
        let (dir, mut library) = temp_library();

        let book = library.add_book("Esaú e Jacó", "/books/esau.txt").unwrap();
        let first = library.add_bookmark(book.id, 100, None).unwrap();
        let second = library.add_bookmark(book.id, 200, None).unwrap();

        assert_ne!(first.id, second.id);
        assert_ne!(first.id, book.id);

        // Ids survive a reload.
        let reloaded = Library::open(dir.path().join("library.json")).unwrap();
        let ids: Vec<u64> = reloaded.bookmarks(book.id).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_bookmark_requires_existing_book() {
        let (_dir, mut library) = temp_library();
        assert!(library.add_bookmark(7, 0, None).is_err());
    }

    #[test]
    fn test_all_books_newest_first() {
        let (_dir, mut library) = temp_library();

        library.add_book("Older", "/books/older.txt").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        library.add_book("Newer", "/books/newer.txt").unwrap();

        let titles: Vec<&str> = library.all_books().iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
    }
}

// 📚 Session - owns the open book and its lifecycle listeners
//
// There is no process-wide "current book". Whoever needs the book gets it
// from the session that owns it. Listeners run synchronously, in the order
// they were registered, while the book is still alive.

use log::{info, warn};

use crate::entities::Book;

/// Called with the book right after it is opened or right before it is closed
pub type BookListener = Box<dyn FnMut(&mut Book)>;

pub struct Session {
    book: Option<Book>,
    on_opened: Vec<BookListener>,
    on_closed: Vec<BookListener>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            book: None,
            on_opened: Vec::new(),
            on_closed: Vec::new(),
        }
    }

    pub fn on_book_opened(&mut self, listener: BookListener) {
        self.on_opened.push(listener);
    }

    pub fn on_book_closed(&mut self, listener: BookListener) {
        self.on_closed.push(listener);
    }

    /// Open `book`, closing the one already open (if any)
    pub fn open(&mut self, book: Book) {
        if self.book.is_some() {
            self.close();
        }

        let mut book = book;
        for listener in self.on_opened.iter_mut() {
            listener(&mut book);
        }
        info!("Opened book with {} transactions", book.transactions().count());
        self.book = Some(book);
    }

    /// Close the open book and hand it back
    pub fn close(&mut self) -> Option<Book> {
        let mut book = self.book.take()?;

        for listener in self.on_closed.iter_mut() {
            listener(&mut book);
        }

        let open = book.transactions().filter(|(id, _)| book.is_open(*id)).count();
        if open > 0 {
            warn!("Closing book with {} transaction(s) still open for edit", open);
        }
        info!("Closed book");
        Some(book)
    }

    pub fn is_open(&self) -> bool {
        self.book.is_some()
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn book_mut(&mut self) -> Option<&mut Book> {
        self.book.as_mut()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

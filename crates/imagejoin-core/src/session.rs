//! Per-session image ordering
//!
//! Holds the user-visible order of uploaded images between interactions.
//! All mutation goes through `SessionState`, which the caller owns and
//! passes in explicitly; there is no ambient storage.

use crate::images::UploadedImage;

/// Images in page order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedImageList {
    images: Vec<UploadedImage>,
}

impl OrderedImageList {
    pub fn new(images: Vec<UploadedImage>) -> Self {
        Self { images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&UploadedImage> {
        self.images.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadedImage> {
        self.images.iter()
    }

    pub fn as_slice(&self) -> &[UploadedImage] {
        &self.images
    }

    pub fn total_size_bytes(&self) -> usize {
        self.images.iter().map(UploadedImage::size_bytes).sum()
    }

    pub fn can_move_up(&self, index: usize) -> bool {
        index > 0 && index < self.images.len()
    }

    pub fn can_move_down(&self, index: usize) -> bool {
        index + 1 < self.images.len()
    }

    /// Swap `index` with its predecessor; returns false when not applicable
    pub fn move_up(&mut self, index: usize) -> bool {
        if !self.can_move_up(index) {
            return false;
        }
        self.images.swap(index, index - 1);
        true
    }

    /// Swap `index` with its successor; returns false when not applicable
    pub fn move_down(&mut self, index: usize) -> bool {
        if !self.can_move_down(index) {
            return false;
        }
        self.images.swap(index, index + 1);
        true
    }
}

/// Session-scoped state for one user
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    list: Option<OrderedImageList>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync the stored list with the files the upload control reports
    ///
    /// The list is replaced only when none exists yet or the file count
    /// changed. A same-sized upload keeps the current list, even when the
    /// files themselves differ. Returns whether the list was replaced.
    pub fn ingest(&mut self, uploads: Vec<UploadedImage>) -> bool {
        if uploads.is_empty() {
            return false;
        }

        let replace = match &self.list {
            None => true,
            Some(list) => list.len() != uploads.len(),
        };

        if replace {
            tracing::debug!(count = uploads.len(), "replacing ordered image list");
            self.list = Some(OrderedImageList::new(uploads));
        } else {
            tracing::debug!(
                count = uploads.len(),
                "upload count unchanged, keeping current order"
            );
        }

        replace
    }

    pub fn move_up(&mut self, index: usize) -> bool {
        self.list
            .as_mut()
            .map(|list| list.move_up(index))
            .unwrap_or(false)
    }

    pub fn move_down(&mut self, index: usize) -> bool {
        self.list
            .as_mut()
            .map(|list| list.move_down(index))
            .unwrap_or(false)
    }

    /// Drop the stored list entirely
    pub fn clear(&mut self) {
        self.list = None;
    }

    pub fn list(&self) -> Option<&OrderedImageList> {
        self.list.as_ref()
    }

    /// Current images in page order; empty when nothing is stored
    pub fn images(&self) -> &[UploadedImage] {
        self.list
            .as_ref()
            .map(OrderedImageList::as_slice)
            .unwrap_or(&[])
    }
}

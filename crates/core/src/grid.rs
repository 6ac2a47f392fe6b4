//! Headless photo grid: a photo list shown through a fixed set of reusable
//! display slots.
//!
//! Image loads run as background tasks and report back through a channel
//! owned by the grid, so every state change happens on the owner's side via
//! [`PhotoGrid::apply`]. Each slot carries a generation that is bumped on every
//! bind, and the photo list carries an epoch bumped on every replacement; a
//! completion whose generation or epoch no longer matches never touches the
//! slot.

use crate::error::SyncError;
use crate::models::{DeviceIdentifier, LoadedImage, PhotoRecord};
use crate::sync::PhotoSyncClient;
use image::DynamicImage;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

pub trait PhotoSelectionDelegate: Send {
    fn user_did_select_photo(&mut self, image: &DynamicImage);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("slot {0} out of range")]
    SlotOutOfRange(usize),
    #[error("photo index {0} out of range")]
    IndexOutOfRange(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub assigned: Option<usize>,
    pub generation: u64,
    pub image: Option<DynamicImage>,
    pub loading: bool,
}

#[derive(Debug)]
pub enum GridEvent {
    ImageLoaded {
        slot: usize,
        generation: u64,
        epoch: u64,
        index: usize,
        result: Result<LoadedImage, SyncError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The record already had a bitmap.
    Ready,
    /// A background load was started.
    Loading,
    /// The record has no image.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Record and slot were updated.
    Cell,
    /// The slot moved on; only the record was updated.
    RecordOnly,
    /// Completion belonged to a replaced list or a failed load for a recycled slot.
    Dropped,
}

pub struct PhotoGrid {
    client: Arc<PhotoSyncClient>,
    photos: Vec<PhotoRecord>,
    cells: Vec<Cell>,
    epoch: u64,
    busy: bool,
    in_flight: usize,
    delegate: Option<Box<dyn PhotoSelectionDelegate>>,
    tx: UnboundedSender<GridEvent>,
    rx: UnboundedReceiver<GridEvent>,
}

impl PhotoGrid {
    pub fn new(client: Arc<PhotoSyncClient>, slots: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            photos: Vec::new(),
            cells: vec![Cell::default(); slots],
            epoch: 0,
            busy: false,
            in_flight: 0,
            delegate: None,
            tx,
            rx,
        }
    }

    pub fn set_delegate(&mut self, delegate: Box<dyn PhotoSelectionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn photos(&self) -> &[PhotoRecord] {
        &self.photos
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn set_photos(&mut self, photos: Vec<PhotoRecord>) {
        self.photos = photos;
        self.epoch += 1;
        for cell in &mut self.cells {
            cell.generation += 1;
            cell.assigned = None;
            cell.image = None;
            cell.loading = false;
        }
    }

    /// Reloads the list for `device_id`. On failure the current list stays.
    pub async fn refresh(&mut self, device_id: &DeviceIdentifier) -> Result<usize, SyncError> {
        self.busy = true;
        let result = self.client.list_photos(device_id).await;
        self.busy = false;
        match result {
            Ok(photos) => {
                let count = photos.len();
                self.set_photos(photos);
                Ok(count)
            }
            Err(e) => {
                warn!("refresh failed, keeping {} photos: {}", self.photos.len(), e);
                Err(e)
            }
        }
    }

    pub fn bind_cell(&mut self, slot: usize, index: usize) -> Result<BindOutcome, GridError> {
        if index >= self.photos.len() {
            return Err(GridError::IndexOutOfRange(index));
        }
        let cell = self
            .cells
            .get_mut(slot)
            .ok_or(GridError::SlotOutOfRange(slot))?;
        cell.generation += 1;
        cell.assigned = Some(index);
        cell.image = None;
        cell.loading = false;

        let record = &self.photos[index];
        if let Some(image) = &record.local_image {
            cell.image = Some(image.clone());
            return Ok(BindOutcome::Ready);
        }
        let Some(image_ref) = record.image_ref.clone() else {
            return Ok(BindOutcome::Empty);
        };

        cell.loading = true;
        let generation = cell.generation;
        let epoch = self.epoch;
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = client.load_image(&image_ref).await;
            // The grid may be gone; nothing to deliver to then.
            let _ = tx.send(GridEvent::ImageLoaded {
                slot,
                generation,
                epoch,
                index,
                result,
            });
        });
        Ok(BindOutcome::Loading)
    }

    pub fn apply(&mut self, event: GridEvent) -> Applied {
        let GridEvent::ImageLoaded {
            slot,
            generation,
            epoch,
            index,
            result,
        } = event;
        self.in_flight = self.in_flight.saturating_sub(1);

        if epoch != self.epoch {
            debug!(slot, index, "dropping completion from a replaced photo list");
            return Applied::Dropped;
        }
        let current = self
            .cells
            .get(slot)
            .map(|c| c.generation == generation)
            .unwrap_or(false);

        match result {
            Ok(loaded) => {
                let bitmap = loaded.bitmap.clone();
                if let Some(record) = self.photos.get_mut(index) {
                    record.apply_loaded(loaded);
                }
                if !current {
                    debug!(slot, index, "slot was reused, leaving it alone");
                    return Applied::RecordOnly;
                }
                let cell = &mut self.cells[slot];
                cell.loading = false;
                cell.image = bitmap;
                Applied::Cell
            }
            Err(e) => {
                warn!(slot, index, "image load failed: {}", e);
                if !current {
                    return Applied::Dropped;
                }
                self.cells[slot].loading = false;
                Applied::Cell
            }
        }
    }

    /// Waits for the next completion and applies it. `None` when nothing is in flight.
    pub async fn next_event(&mut self) -> Option<Applied> {
        if self.in_flight == 0 {
            return None;
        }
        let event = self.rx.recv().await?;
        Some(self.apply(event))
    }

    /// Applies whatever completions have already arrived.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Runs the event pump until every started load has reported back.
    pub async fn settle(&mut self) {
        while self.next_event().await.is_some() {}
    }

    /// Notifies the delegate if the photo at `index` has a downloaded image.
    pub fn select(&mut self, index: usize) -> bool {
        let Some(image) = self
            .photos
            .get(index)
            .and_then(|record| record.local_image.as_ref())
        else {
            return false;
        };
        match self.delegate.as_mut() {
            Some(delegate) => {
                delegate.user_did_select_photo(image);
                true
            }
            None => false,
        }
    }

    /// Drops decoded bitmaps of photos not bound to any slot.
    pub fn purge_images(&mut self) -> usize {
        let visible: HashSet<usize> = self.cells.iter().filter_map(|c| c.assigned).collect();
        let mut released = 0;
        for (index, record) in self.photos.iter_mut().enumerate() {
            if !visible.contains(&index) && record.release_image() {
                released += 1;
            }
        }
        released
    }
}

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::{debug, info};

use super::model::{Channel, MergedPlateReading, PlateId, PlateReading, Provenance, Reading};
use crate::error::{Error, Result};

/// Whether a value counts as reported for the redo fold.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl<T> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl Presence for Reading {
    fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

/// Fold ordered layers so that, per key, the latest *present* value wins.
///
/// A missing value only fills a key nobody reported yet; it never erases an
/// earlier present value. Keys absent from every layer are absent from the
/// result. Layer order matters: this is not commutative.
pub fn fold_last_present<K, V, L, I>(layers: L) -> BTreeMap<K, V>
where
    K: Ord,
    V: Presence,
    L: IntoIterator<Item = I>,
    I: IntoIterator<Item = (K, V)>,
{
    layers.into_iter().fold(BTreeMap::new(), |mut merged, layer| {
        for (key, value) in layer {
            match merged.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => {
                    if value.is_present() {
                        slot.insert(value);
                    }
                }
            }
        }
        merged
    })
}

/// Merge the parsed files of one plate/channel, first file first.
pub fn merge_redo(plate: PlateId, files: &[PlateReading]) -> Result<MergedPlateReading> {
    let first = files
        .first()
        .ok_or_else(|| Error::config(format!("plate {plate} has an empty file group")))?;
    let channel: Channel = first.channel;
    if let Some(other) = files.iter().find(|f| f.channel != channel) {
        return Err(Error::config(format!(
            "plate {plate}: {} is a {} file in a {channel} group",
            other.source, other.channel
        )));
    }

    let layers = files.iter().enumerate().map(|(attempt, file)| {
        file.wells.iter().map(move |(&well, &value)| {
            (
                well,
                Reading {
                    value,
                    provenance: Provenance {
                        file: file.source.clone(),
                        attempt,
                    },
                },
            )
        })
    });
    let wells = fold_last_present(layers);

    let mut plate_info = first.info.clone();
    for file in &files[1..] {
        plate_info.fill_from(&file.info);
    }

    let recovered = wells.values().filter(|r| r.provenance.attempt > 0).count();
    if recovered > 0 {
        info!(
            "plate {plate} {channel}: {recovered} wells taken from {} redo file(s)",
            files.len() - 1
        );
    }
    debug!("plate {plate} {channel}: merged {} wells", wells.len());

    Ok(MergedPlateReading {
        plate,
        channel,
        info: plate_info,
        sources: files.iter().map(|f| f.source.clone()).collect(),
        wells,
    })
}

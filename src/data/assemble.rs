use std::collections::BTreeSet;

use log::{debug, warn};

use super::diagnostics::Diagnostic;
use super::metadata::Metadata;
use super::model::{Channel, ExperimentRow, MergedPlateReading, PlateId};
use super::table::ExperimentTable;
use super::well::WellCoordinate;
use crate::error::{Error, Result};

/// The unified table plus the completeness diagnostics of the join.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub table: ExperimentTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Check that metadata and the two plate lists line up positionally.
///
/// Runs before any plate file is parsed: the two channel lists must have the
/// same non-zero length, and the highest metadata plate must be exactly that
/// length.
pub fn validate_alignment(metadata: &Metadata, firefly_plates: usize, renilla_plates: usize) -> Result<()> {
    if firefly_plates != renilla_plates {
        return Err(Error::config(format!(
            "{firefly_plates} firefly plate group(s) but {renilla_plates} renilla plate group(s)"
        )));
    }
    if firefly_plates == 0 {
        return Err(Error::config("no plates supplied"));
    }
    let max_plate = metadata
        .max_plate()
        .ok_or_else(|| Error::config("metadata has no records"))?;
    if max_plate.index() + 1 != firefly_plates {
        return Err(Error::config(format!(
            "metadata describes {max_plate} plate(s) but {firefly_plates} plate group(s) were supplied"
        )));
    }
    Ok(())
}

/// Inner join on metadata of both channels, plate by plate.
///
/// Wells read but not annotated are dropped with a diagnostic; annotated
/// wells without a value keep their row with a gap for that channel.
pub fn assemble(
    firefly: &[MergedPlateReading],
    renilla: &[MergedPlateReading],
    metadata: &Metadata,
) -> Result<Assembled> {
    validate_alignment(metadata, firefly.len(), renilla.len())?;
    check_positions(firefly, Channel::Firefly)?;
    check_positions(renilla, Channel::Renilla)?;

    let mut rows = Vec::with_capacity(metadata.len());
    let mut diagnostics = Vec::new();

    for (ff, rn) in firefly.iter().zip(renilla) {
        let plate = ff.plate;
        let date = ff.info.measured_on();
        let annotated: BTreeSet<WellCoordinate> = metadata.plate(plate).map(|(w, _)| w).collect();
        if annotated.is_empty() {
            warn!("plate {plate}: no metadata for any well");
            diagnostics.push(Diagnostic::PlateWithoutMetadata { plate });
        }

        let wells: BTreeSet<WellCoordinate> = annotated
            .iter()
            .copied()
            .chain(ff.wells.keys().copied())
            .chain(rn.wells.keys().copied())
            .collect();

        let mut dropped = 0;
        for well in wells {
            let Some(record) = metadata.get(plate, well) else {
                dropped += 1;
                diagnostics.push(Diagnostic::MissingMetadata { plate, well });
                continue;
            };
            let firefly = ff.value(&well);
            let renilla = rn.value(&well);
            for (value, channel) in [(firefly, Channel::Firefly), (renilla, Channel::Renilla)] {
                if value.is_none() {
                    debug!("plate {plate} well {well}: no {channel} value");
                    diagnostics.push(Diagnostic::MissingReading {
                        plate,
                        well,
                        channel,
                    });
                }
            }
            rows.push(ExperimentRow {
                plate,
                well,
                sample: record.sample.clone(),
                induction: record.induction.clone(),
                replicate: record.replicate.clone(),
                group: record.group.clone(),
                date,
                firefly,
                renilla,
                extra: record.extra.clone(),
            });
        }
        if dropped > 0 && !annotated.is_empty() {
            warn!("plate {plate}: {dropped} measured well(s) without metadata were dropped");
        }
    }

    debug!("assembled {} rows, {} diagnostics", rows.len(), diagnostics.len());
    Ok(Assembled {
        table: ExperimentTable::new(rows),
        diagnostics,
    })
}

fn check_positions(readings: &[MergedPlateReading], channel: Channel) -> Result<()> {
    for (i, reading) in readings.iter().enumerate() {
        if reading.channel != channel {
            return Err(Error::config(format!(
                "plate {} was supplied as {channel} but holds {} readings",
                reading.plate, reading.channel
            )));
        }
        if reading.plate != PlateId::from_index(i) {
            return Err(Error::config(format!(
                "{channel} plate at position {} is labelled plate {}",
                i + 1,
                reading.plate
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{CellValue, MetadataRecord, PlateInfo, Provenance, Reading};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn well(s: &str) -> WellCoordinate {
        s.parse().unwrap()
    }

    fn reading(plate: u32, channel: Channel, wells: &[(&str, Option<f64>)]) -> MergedPlateReading {
        let file: Arc<str> = Arc::from(format!("p{plate}-{channel}.xlsx"));
        MergedPlateReading {
            plate: PlateId(plate),
            channel,
            info: PlateInfo::default(),
            sources: vec![file.clone()],
            wells: wells
                .iter()
                .map(|&(w, value)| {
                    (
                        well(w),
                        Reading {
                            value,
                            provenance: Provenance {
                                file: file.clone(),
                                attempt: 0,
                            },
                        },
                    )
                })
                .collect(),
        }
    }

    fn record(sample: &str, group: &str) -> MetadataRecord {
        MetadataRecord {
            sample: sample.into(),
            induction: CellValue::Integer(10),
            replicate: None,
            group: group.into(),
            extra: BTreeMap::new(),
        }
    }

    fn metadata(entries: &[(u32, &str, &str, &str)]) -> Metadata {
        entries
            .iter()
            .map(|&(p, w, s, g)| ((PlateId(p), well(w)), record(s, g)))
            .collect()
    }

    #[test]
    fn unannotated_well_is_dropped_with_diagnostic() {
        let md = metadata(&[(1, "A1", "X", "treated"), (2, "A1", "X", "treated")]);
        let ff = vec![
            reading(1, Channel::Firefly, &[("A1", Some(100.0))]),
            reading(2, Channel::Firefly, &[("A1", Some(10.0)), ("H12", Some(5.0))]),
        ];
        let rn = vec![
            reading(1, Channel::Renilla, &[("A1", Some(50.0))]),
            reading(2, Channel::Renilla, &[("A1", Some(5.0)), ("H12", Some(1.0))]),
        ];
        let assembled = assemble(&ff, &rn, &md).unwrap();
        assert_eq!(assembled.table.len(), 2);
        assert!(assembled
            .table
            .iter()
            .all(|r| r.well == well("A1")));
        assert_eq!(
            assembled.diagnostics,
            vec![Diagnostic::MissingMetadata {
                plate: PlateId(2),
                well: well("H12")
            }]
        );
    }

    #[test]
    fn annotated_well_without_reading_keeps_a_gap() {
        let md = metadata(&[(1, "A1", "X", "treated"), (1, "B1", "X", "treated")]);
        let ff = vec![reading(1, Channel::Firefly, &[("A1", Some(100.0)), ("B1", None)])];
        let rn = vec![reading(1, Channel::Renilla, &[("A1", Some(50.0))])];
        let assembled = assemble(&ff, &rn, &md).unwrap();
        let b1 = &assembled.table.rows()[1];
        assert_eq!(b1.well, well("B1"));
        assert_eq!(b1.firefly, None);
        assert_eq!(b1.renilla, None);
        assert_eq!(assembled.diagnostics.len(), 2);
        assert!(assembled.diagnostics.contains(&Diagnostic::MissingReading {
            plate: PlateId(1),
            well: well("B1"),
            channel: Channel::Renilla
        }));
    }

    #[test]
    fn rows_follow_plate_then_well_order() {
        let md = metadata(&[
            (2, "A1", "X", "g"),
            (1, "B1", "X", "g"),
            (1, "A10", "X", "g"),
            (1, "A2", "X", "g"),
        ]);
        let ff = vec![reading(1, Channel::Firefly, &[]), reading(2, Channel::Firefly, &[])];
        let rn = vec![reading(1, Channel::Renilla, &[]), reading(2, Channel::Renilla, &[])];
        let assembled = assemble(&ff, &rn, &md).unwrap();
        let order: Vec<String> = assembled
            .table
            .iter()
            .map(|r| format!("{}:{}", r.plate, r.well))
            .collect();
        assert_eq!(order, ["1:A2", "1:A10", "1:B1", "2:A1"]);
    }

    #[test]
    fn plate_gap_in_metadata_is_reported() {
        let md = metadata(&[(2, "A1", "X", "g")]);
        let ff = vec![reading(1, Channel::Firefly, &[("A1", Some(1.0))]), reading(2, Channel::Firefly, &[("A1", Some(1.0))])];
        let rn = vec![reading(1, Channel::Renilla, &[("A1", Some(1.0))]), reading(2, Channel::Renilla, &[("A1", Some(1.0))])];
        let assembled = assemble(&ff, &rn, &md).unwrap();
        assert_eq!(assembled.table.len(), 1);
        assert!(assembled
            .diagnostics
            .contains(&Diagnostic::PlateWithoutMetadata { plate: PlateId(1) }));
    }

    #[test]
    fn rows_carry_the_firefly_measurement_day() {
        let md = metadata(&[(1, "A1", "X", "g"), (2, "A1", "X", "g")]);
        let mut ff = vec![
            reading(1, Channel::Firefly, &[("A1", Some(1.0))]),
            reading(2, Channel::Firefly, &[("A1", Some(1.0))]),
        ];
        ff[0].info.date = Some("3/4/2021".into());
        ff[1].info.start = Some("2021-03-05 09:00:00".into());
        let mut rn = vec![
            reading(1, Channel::Renilla, &[("A1", Some(1.0))]),
            reading(2, Channel::Renilla, &[("A1", Some(1.0))]),
        ];
        rn[0].info.date = Some("2021-01-01".into());
        let assembled = assemble(&ff, &rn, &md).unwrap();
        let days: Vec<_> = assembled.table.iter().map(|r| r.date).collect();
        assert_eq!(
            days,
            [
                chrono::NaiveDate::from_ymd_opt(2021, 3, 4),
                chrono::NaiveDate::from_ymd_opt(2021, 3, 5)
            ]
        );
    }

    #[test]
    fn misaligned_inputs_are_configuration_errors() {
        let md = metadata(&[(1, "A1", "X", "g"), (3, "A1", "X", "g")]);
        assert!(matches!(validate_alignment(&md, 3, 2), Err(Error::Configuration(_))));
        assert!(matches!(validate_alignment(&md, 2, 2), Err(Error::Configuration(_))));
        assert!(validate_alignment(&md, 3, 3).is_ok());
        assert!(matches!(
            validate_alignment(&Metadata::default(), 1, 1),
            Err(Error::Configuration(_))
        ));

        let md = metadata(&[(1, "A1", "X", "g")]);
        let swapped = vec![reading(1, Channel::Renilla, &[])];
        let rn = vec![reading(1, Channel::Renilla, &[])];
        assert!(matches!(assemble(&swapped, &rn, &md), Err(Error::Configuration(_))));
    }
}

//! Schema bridging: reconcile a live source schema with declared columns.

use crate::convert::{DateTimeFormatInformation, DateTimePattern};
use crate::diagnostics::{Diagnostic, Diagnostics, WarningKind};
use crate::error::{WriterError, WriterResult};
use crate::model::column::{collection_identifier, unique_names};
use crate::model::{ColumnCollection, DataType, TimeZonePart, ValueFormat, ValueFormatBuilder};
use crate::source::SourceColumn;

/// Where the output time zone of a date/time column comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterTimeZone {
    Constant(String),
    /// Source ordinal of the column holding the zone id.
    Column(usize),
}

/// A resolved, write-ready column.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterColumn {
    /// Name written to header lines and templates.
    pub name: String,
    /// Ordinal of the source column the value is taken from.
    pub source_ordinal: usize,
    pub value_format: ValueFormat,
    /// Width for fixed-width output, 0 for unbounded.
    pub field_length: usize,
    pub time_zone: Option<WriterTimeZone>,
}

/// Width a value of this format needs when none was declared.
pub fn default_field_length(format: &ValueFormat) -> usize {
    match format.data_type() {
        DataType::Integer => 10,
        DataType::Boolean => format
            .true_format()
            .chars()
            .count()
            .max(format.false_format().chars().count()),
        DataType::Double | DataType::Numeric => 28,
        DataType::DateTime => {
            DateTimeFormatInformation::new(
                format.date_format(),
                format.date_separator(),
                format.time_separator(),
            )
            .max_length
        }
        DataType::Guid => 36,
        _ => 0,
    }
}

/// Fill empty literal and pattern settings from `general`, then from the
/// built-in defaults.
fn with_fallbacks(format: &ValueFormat, general: &ValueFormat) -> WriterResult<ValueFormat> {
    let defaults = ValueFormatBuilder::new(format.data_type());
    let pick = |own: &str, general: &str, default: &str| {
        [own, general, default]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    };
    let mut builder = format.to_builder();
    builder.true_format = pick(format.true_format(), general.true_format(), &defaults.true_format);
    builder.false_format = pick(format.false_format(), general.false_format(), &defaults.false_format);
    builder.date_format = pick(format.date_format(), general.date_format(), &defaults.date_format);
    builder.number_format =
        pick(format.number_format(), general.number_format(), &defaults.number_format);
    Ok(builder.build()?)
}

/// Resolve the columns to write.
///
/// Declared columns are matched to the source by case-insensitive name;
/// source columns without a declaration use `general` with the source type.
/// A declared `TimePart` column absent from the source is added right after
/// its date column. Fails only if no column is left to write.
pub fn get_column_information(
    schema: &[SourceColumn],
    declared: &ColumnCollection,
    general: &ValueFormat,
    diagnostics: &mut Diagnostics,
) -> WriterResult<Vec<WriterColumn>> {
    let names = unique_names(&schema.iter().map(|c| c.name.clone()).collect::<Vec<_>>());
    let ids: Vec<u64> = names.iter().map(|n| collection_identifier(n)).collect();
    let position = |name: &str| ids.iter().position(|id| *id == collection_identifier(name));

    let mut result: Vec<WriterColumn> = Vec::with_capacity(schema.len());
    for (index, source) in schema.iter().enumerate() {
        let name = &names[index];
        let Some(column) = declared.get(name) else {
            let value_format = with_fallbacks(&general.with_data_type(source.data_type), general)?;
            result.push(WriterColumn {
                name: name.clone(),
                source_ordinal: source.ordinal,
                field_length: default_field_length(&value_format),
                value_format,
                time_zone: None,
            });
            continue;
        };
        if column.ignore() {
            continue;
        }

        let value_format = with_fallbacks(column.value_format(), general)?;
        let time_zone = match column.time_zone_part() {
            Some(TimeZonePart::Constant(zone)) => Some(WriterTimeZone::Constant(zone.clone())),
            Some(TimeZonePart::Column(zone_column)) => match position(zone_column) {
                Some(zone_index) => Some(WriterTimeZone::Column(schema[zone_index].ordinal)),
                None => {
                    diagnostics.emit(Diagnostic::warning(
                        WarningKind::ColumnNotFound,
                        format!("Time zone column '{zone_column}' of '{name}' is not present"),
                    ));
                    None
                }
            },
            None => None,
        };

        let time_part = column.time_part();
        let synthesize = value_format.data_type() == DataType::DateTime
            && !time_part.is_empty()
            && position(time_part).is_none();
        let time_column = if synthesize {
            if DateTimePattern::parse(value_format.date_format()).has_time() {
                diagnostics.emit(
                    Diagnostic::warning(
                        WarningKind::RedundantTimePart,
                        format!(
                            "Date format '{}' already contains a time, '{}' repeats it",
                            value_format.date_format(),
                            time_part
                        ),
                    )
                    .with_column(source.ordinal, name.as_str()),
                );
            }
            let mut builder = value_format.to_builder();
            builder.date_format = column.time_part_format().to_string();
            if builder.date_format.is_empty() {
                builder.date_format = "HH:mm:ss".to_string();
            }
            let time_format = builder.build()?;
            Some(WriterColumn {
                name: time_part.to_string(),
                source_ordinal: source.ordinal,
                field_length: default_field_length(&time_format),
                value_format: time_format,
                time_zone: time_zone.clone(),
            })
        } else {
            None
        };

        result.push(WriterColumn {
            name: column.output_name().to_string(),
            source_ordinal: source.ordinal,
            field_length: column
                .field_length()
                .unwrap_or_else(|| default_field_length(&value_format)),
            value_format,
            time_zone,
        });
        result.extend(time_column);
    }

    for column in declared {
        if !column.ignore() && position(column.name()).is_none() {
            diagnostics.emit(Diagnostic::warning(
                WarningKind::ColumnNotFound,
                format!("Column '{}' is not present in the source", column.name()),
            ));
        }
    }

    if result.is_empty() {
        return Err(WriterError::NoColumns);
    }
    tracing::debug!(columns = result.len(), "writer columns resolved");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;

    fn schema(columns: &[(&str, DataType)]) -> Vec<SourceColumn> {
        columns
            .iter()
            .enumerate()
            .map(|(ordinal, (name, data_type))| SourceColumn::new(ordinal, *name, *data_type))
            .collect()
    }

    fn declared(columns: Vec<Column>) -> ColumnCollection {
        ColumnCollection::try_from(columns).unwrap()
    }

    #[test]
    fn test_default_lengths() {
        let boolean = ValueFormat::builder(DataType::Boolean)
            .true_format("yes")
            .false_format("no")
            .build()
            .unwrap();
        assert_eq!(default_field_length(&boolean), 3);
        assert_eq!(default_field_length(&ValueFormat::new(DataType::Integer)), 10);
        assert_eq!(default_field_length(&ValueFormat::new(DataType::Double)), 28);
        assert_eq!(default_field_length(&ValueFormat::new(DataType::Guid)), 36);
        assert_eq!(default_field_length(&ValueFormat::new(DataType::String)), 0);
        let date = ValueFormat::builder(DataType::DateTime)
            .date_format("dd/MM/yyyy")
            .build()
            .unwrap();
        assert_eq!(default_field_length(&date), 10);
    }

    #[test]
    fn test_unmatched_columns_use_source_type() {
        let mut diagnostics = Diagnostics::new();
        let columns = get_column_information(
            &schema(&[("id", DataType::Integer), ("", DataType::String), ("id", DataType::String)]),
            &ColumnCollection::new(),
            &ValueFormat::default(),
            &mut diagnostics,
        )
        .unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "Column2", "id2"]);
        assert_eq!(columns[0].value_format.data_type(), DataType::Integer);
        assert_eq!(columns[0].field_length, 10);
        assert!(diagnostics.report().is_empty());
    }

    #[test]
    fn test_declared_column_overrides() {
        let mut diagnostics = Diagnostics::new();
        let columns = get_column_information(
            &schema(&[("Amount", DataType::Double), ("skip", DataType::String)]),
            &declared(vec![
                Column::builder("amount")
                    .value_format(ValueFormat::new(DataType::Integer))
                    .destination_name("Total")
                    .field_length(6)
                    .build()
                    .unwrap(),
                Column::builder("skip").ignore(true).build().unwrap(),
                Column::new("absent"),
            ]),
            &ValueFormat::default(),
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "Total");
        assert_eq!(columns[0].field_length, 6);
        assert_eq!(diagnostics.report().count_of(WarningKind::ColumnNotFound), 1);
    }

    #[test]
    fn test_time_part_synthesized_after_parent() {
        let mut diagnostics = Diagnostics::new();
        let date = Column::builder("when")
            .value_format(
                ValueFormat::builder(DataType::DateTime)
                    .date_format("yyyy-MM-dd HH:mm")
                    .build()
                    .unwrap(),
            )
            .time_part("at", "HH:mm")
            .time_zone_part("\"+01:00\"")
            .build()
            .unwrap();
        let columns = get_column_information(
            &schema(&[("when", DataType::DateTime), ("x", DataType::String)]),
            &declared(vec![date]),
            &ValueFormat::default(),
            &mut diagnostics,
        )
        .unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["when", "at", "x"]);
        assert_eq!(columns[1].value_format.date_format(), "HH:mm");
        assert_eq!(columns[1].source_ordinal, 0);
        assert_eq!(columns[1].field_length, 5);
        assert_eq!(
            columns[0].time_zone,
            Some(WriterTimeZone::Constant("+01:00".into()))
        );
        assert_eq!(diagnostics.report().count_of(WarningKind::RedundantTimePart), 1);
    }

    #[test]
    fn test_empty_formats_fall_back() {
        let general = ValueFormat::builder(DataType::String)
            .true_format("Y")
            .build()
            .unwrap();
        let boolean = ValueFormat::builder(DataType::Boolean)
            .true_format("")
            .false_format("")
            .build()
            .unwrap();
        let resolved = with_fallbacks(&boolean, &general).unwrap();
        assert_eq!(resolved.true_format(), "Y");
        assert_eq!(resolved.false_format(), "False");
    }

    #[test]
    fn test_no_columns_is_fatal() {
        let result = get_column_information(
            &[],
            &ColumnCollection::new(),
            &ValueFormat::default(),
            &mut Diagnostics::new(),
        );
        assert!(matches!(result, Err(WriterError::NoColumns)));
    }
}

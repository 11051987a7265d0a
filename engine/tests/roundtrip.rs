//! Write-then-read tests across the reader and writer engines.

use chrono::NaiveDate;
use delimit::{
    CancellationToken, Column, ColumnCollection, CsvReader, DataType, DialectConfig, FileWriter,
    InMemoryDataReader, OutputKind, QualifierMode, RecordDelimiter, SourceColumn, TypedValue,
    ValueFormat, WarningKind, WriterOptions,
};
use uuid::Uuid;

async fn write_text(
    reader: &mut InMemoryDataReader,
    dialect: &DialectConfig,
    columns: &ColumnCollection,
    options: WriterOptions,
) -> String {
    let mut writer = FileWriter::new(dialect.clone(), columns.clone(), options).unwrap();
    let mut out = Vec::new();
    writer
        .write(reader, &mut out, &CancellationToken::new())
        .await
        .unwrap();
    String::from_utf8(out).unwrap()
}

async fn read_fields(
    text: &str,
    dialect: &DialectConfig,
    columns: &ColumnCollection,
) -> Vec<Vec<String>> {
    let mut reader = CsvReader::new(text.as_bytes(), dialect.clone(), columns.clone()).unwrap();
    let cancel = CancellationToken::new();
    let mut rows = Vec::new();
    while let Some(record) = reader.read_record(&cancel).await.unwrap() {
        rows.push(record.fields);
    }
    rows
}

const AWKWARD: &[&str] = &[
    "a,b",
    "He said \"hi\"",
    "two\nlines",
    "crlf\r\nbreak",
    "\"starts quoted",
    " leading space",
    "trailing space ",
    "plain",
    "",
    "ends with comma,",
];

fn awkward_rows() -> Vec<Vec<&'static str>> {
    AWKWARD.iter().map(|value| vec!["x", *value, "y"]).collect()
}

fn awkward_source() -> InMemoryDataReader {
    let rows = awkward_rows();
    let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
    InMemoryDataReader::from_strings(&["left", "value", "right"], &rows)
}

#[tokio::test]
async fn quoted_values_survive_a_round_trip() {
    let dialect = DialectConfig::default();
    let columns = ColumnCollection::new();
    let text = write_text(
        &mut awkward_source(),
        &dialect,
        &columns,
        WriterOptions::default(),
    )
    .await;

    let rows = read_fields(&text, &dialect, &columns).await;
    assert_eq!(rows, awkward_rows());
}

#[tokio::test]
async fn written_csv_is_accepted_by_an_independent_parser() {
    let dialect = DialectConfig::default();
    let text = write_text(
        &mut awkward_source(),
        &dialect,
        &ColumnCollection::new(),
        WriterOptions::default(),
    )
    .await;

    let mut oracle = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let rows: Vec<Vec<String>> = oracle
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    assert_eq!(rows, awkward_rows());
}

#[tokio::test]
async fn escape_prefix_round_trip() {
    let dialect = DialectConfig {
        escape_prefix: Some('\\'),
        qualifier_mode: QualifierMode::Plain,
        ..Default::default()
    };
    let columns = ColumnCollection::new();
    let mut source = InMemoryDataReader::from_strings(
        &["value"],
        &[&["c:\\temp"], &["say \"x\""], &["a,b\\"]],
    );
    let text = write_text(&mut source, &dialect, &columns, WriterOptions::default()).await;
    let rows = read_fields(&text, &dialect, &columns).await;
    assert_eq!(rows, vec![vec!["c:\\temp"], vec!["say \"x\""], vec!["a,b\\"]]);
}

#[tokio::test]
async fn context_sensitive_qualifier_round_trip() {
    let mut dialect = DialectConfig::default();
    dialect.set_context_sensitive_qualifier(true);
    let columns = ColumnCollection::new();
    let mut source = InMemoryDataReader::from_strings(
        &["value"],
        &[&["5\" tall"], &["\"quoted\" word"], &["a,b"]],
    );
    let text = write_text(&mut source, &dialect, &columns, WriterOptions::default()).await;
    let rows = read_fields(&text, &dialect, &columns).await;
    assert_eq!(rows, vec![vec!["5\" tall"], vec!["\"quoted\" word"], vec!["a,b"]]);
}

#[tokio::test]
async fn placeholders_keep_delimiters_in_values() {
    let dialect = DialectConfig {
        field_qualifier: None,
        delimiter_placeholder: "{d}".into(),
        newline_placeholder: "{n}".into(),
        ..Default::default()
    };
    let columns = ColumnCollection::new();
    let mut source = InMemoryDataReader::from_strings(&["a", "b"], &[&["1,5", "line\none"]]);
    let text = write_text(&mut source, &dialect, &columns, WriterOptions::default()).await;
    assert_eq!(text, "a,b\r\n1{d}5,line{n}one\r\n");

    let rows = read_fields(&text, &dialect, &columns).await;
    assert_eq!(rows, vec![vec!["1,5", "line\none"]]);
}

#[tokio::test]
async fn duplicate_qualifier_scenario() {
    let dialect = DialectConfig {
        new_line: RecordDelimiter::Lf,
        ..Default::default()
    };
    let columns = ColumnCollection::new();
    let options = WriterOptions {
        column_header: false,
        ..Default::default()
    };
    let mut source = InMemoryDataReader::from_strings(&["v"], &[&["He said \"hi\""]]);
    let text = write_text(&mut source, &dialect, &columns, options).await;
    assert_eq!(text, "\"He said \"\"hi\"\"\"\n");

    let reading = DialectConfig {
        has_field_header: false,
        ..dialect
    };
    let rows = read_fields(&text, &reading, &columns).await;
    assert_eq!(rows, vec![vec!["He said \"hi\""]]);
}

#[tokio::test]
async fn grouped_integer_scenario() {
    let columns = ColumnCollection::try_from(vec![Column::with_format(
        "n",
        ValueFormat::builder(DataType::Integer)
            .group_separator(",")
            .decimal_separator(".")
            .build()
            .unwrap(),
    )])
    .unwrap();
    let dialect = DialectConfig {
        field_delimiter: ';',
        ..Default::default()
    };
    let mut reader = CsvReader::new(&b"n\n1,234\n"[..], dialect, columns).unwrap();
    let record = reader
        .read_record(&CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        reader.convert(&record).await.unwrap(),
        vec![TypedValue::Integer(1234)]
    );
}

fn typed_columns() -> ColumnCollection {
    ColumnCollection::try_from(vec![
        Column::with_format("id", ValueFormat::new(DataType::Integer)),
        Column::with_format("price", ValueFormat::new(DataType::Double)),
        Column::with_format(
            "when",
            ValueFormat::builder(DataType::DateTime)
                .date_format("yyyy-MM-dd HH:mm:ss")
                .build()
                .unwrap(),
        ),
        Column::with_format("ok", ValueFormat::new(DataType::Boolean)),
        Column::with_format("key", ValueFormat::new(DataType::Guid)),
        Column::new("note"),
    ])
    .unwrap()
}

fn typed_source() -> (Vec<SourceColumn>, Vec<Vec<TypedValue>>) {
    let schema = vec![
        SourceColumn::new(0, "id", DataType::Integer),
        SourceColumn::new(1, "price", DataType::Double),
        SourceColumn::new(2, "when", DataType::DateTime),
        SourceColumn::new(3, "ok", DataType::Boolean),
        SourceColumn::new(4, "key", DataType::Guid),
        SourceColumn::new(5, "note", DataType::String),
    ];
    let when = NaiveDate::from_ymd_opt(2010, 1, 20)
        .unwrap()
        .and_hms_opt(14, 30, 5)
        .unwrap();
    let key = Uuid::parse_str("6f9619ff-8b86-d011-b42d-00cf4fc964ff").unwrap();
    let rows = vec![
        vec![
            TypedValue::Integer(-42),
            TypedValue::Double(12.5),
            TypedValue::DateTime(when),
            TypedValue::Boolean(true),
            TypedValue::Guid(key),
            TypedValue::from("semi; colon, comma"),
        ],
        vec![
            TypedValue::Integer(7),
            TypedValue::Null,
            TypedValue::Null,
            TypedValue::Boolean(false),
            TypedValue::Null,
            TypedValue::Null,
        ],
    ];
    (schema, rows)
}

#[tokio::test]
async fn typed_rows_survive_a_round_trip() {
    let dialect = DialectConfig::default();
    let columns = typed_columns();
    let (schema, rows) = typed_source();
    let mut source = InMemoryDataReader::new(schema, rows.clone());
    let text = write_text(&mut source, &dialect, &columns, WriterOptions::default()).await;

    let mut reader = CsvReader::new(text.as_bytes(), dialect, columns).unwrap();
    let cancel = CancellationToken::new();
    let mut read_back = Vec::new();
    while let Some(record) = reader.read_record(&cancel).await.unwrap() {
        read_back.push(reader.convert(&record).await.unwrap());
    }
    assert_eq!(read_back, rows);
    let report = reader.diagnostics().report();
    assert_eq!(report.error_count(), 0);
    assert_eq!(report.count_of(WarningKind::DelimiterInValue), 1);
}

#[tokio::test]
async fn fixed_width_round_trip() {
    let columns = ColumnCollection::try_from(vec![
        Column::builder("code").field_length(4).build().unwrap(),
        Column::builder("qty")
            .value_format(ValueFormat::new(DataType::Integer))
            .field_length(5)
            .build()
            .unwrap(),
    ])
    .unwrap();
    let dialect = DialectConfig {
        fixed_width: true,
        ..Default::default()
    };
    let schema = vec![
        SourceColumn::new(0, "code", DataType::String),
        SourceColumn::new(1, "qty", DataType::Integer),
    ];
    let rows = vec![
        vec![TypedValue::from("AB"), TypedValue::Integer(12)],
        vec![TypedValue::from("TOOLONG"), TypedValue::Integer(3)],
    ];
    let mut source = InMemoryDataReader::new(schema, rows);
    let mut writer = FileWriter::new(
        dialect.clone(),
        columns.clone(),
        WriterOptions {
            output: OutputKind::FixedWidth,
            ..Default::default()
        },
    )
    .unwrap();
    let mut out = Vec::new();
    writer
        .write(&mut source, &mut out, &CancellationToken::new())
        .await
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text, "codeqty  \r\nAB  12   \r\nTOOL3    \r\n");
    assert_eq!(writer.diagnostics().report().count_of(WarningKind::Truncated), 1);

    let rows = read_fields(&text, &dialect, &columns).await;
    assert_eq!(rows, vec![vec!["AB", "12"], vec!["TOOL", "3"]]);
}

#[tokio::test]
async fn reader_feeds_writer() {
    let columns = ColumnCollection::try_from(vec![Column::with_format(
        "n",
        ValueFormat::new(DataType::Integer),
    )])
    .unwrap();
    let input = "n;label\n1;one\n2;\"two; three\"\n";
    let dialect = DialectConfig {
        field_delimiter: ';',
        ..Default::default()
    };
    let mut reader = CsvReader::new(input.as_bytes(), dialect.clone(), columns.clone()).unwrap();
    let mut writer = FileWriter::new(
        dialect,
        columns,
        WriterOptions {
            output: OutputKind::Json,
            ..Default::default()
        },
    )
    .unwrap();
    let mut out = Vec::new();
    let records = writer
        .write(&mut reader, &mut out, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(records, 2);

    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"n": 1, "label": "one"},
            {"n": 2, "label": "two; three"}
        ])
    );
}

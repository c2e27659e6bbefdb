//! End-to-end tests of the executor loop over in-memory IPC streams.

use arrow::array::{
    Array, ArrayRef, AsArray, Float32Array, Int64Array, ListArray, StringArray, StructArray,
};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, Fields, Float32Type, Int64Type, Schema};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use rb_error::{RbError, TransformError};
use rb_extension::{ExtensionRegistry, IpCodec, SubnetCodec};
use rb_protocol::serve;
use rb_transform::{BridgeConfig, RhaiBridge, ScriptTransform};
use std::io::Cursor;
use std::sync::Arc;

fn script(code: &str) -> ScriptTransform<RhaiBridge> {
    let bridge = RhaiBridge::new(code, &BridgeConfig::default()).unwrap();
    ScriptTransform::new(bridge, Arc::new(ExtensionRegistry::new()))
}

fn encode(batches: &[RecordBatch]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for batch in batches {
        let mut writer = StreamWriter::try_new(&mut bytes, &batch.schema()).unwrap();
        writer.write(batch).unwrap();
        writer.finish().unwrap();
    }
    bytes
}

fn decode(bytes: Vec<u8>, streams: usize) -> Vec<RecordBatch> {
    let mut cursor = Cursor::new(bytes);
    let mut batches = Vec::new();
    for _ in 0..streams {
        let reader = StreamReader::try_new(&mut cursor, None).unwrap();
        let stream: Vec<RecordBatch> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(stream.len(), 1, "every output stream holds one batch");
        batches.extend(stream);
    }
    assert_eq!(cursor.position() as usize, cursor.get_ref().len());
    batches
}

fn run(code: &str, batches: &[RecordBatch]) -> Vec<RecordBatch> {
    let mut output = Vec::new();
    let stats = serve(Cursor::new(encode(batches)), &mut output, &script(code)).unwrap();
    assert_eq!(stats.batches, batches.len() as u64);
    decode(output, batches.len())
}

fn flat_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap()
}

fn struct_batch() -> RecordBatch {
    let inner = Fields::from(vec![
        Field::new("a", DataType::Int64, true),
        Field::new("b", DataType::Utf8, true),
    ]);
    let p = StructArray::new(
        inner.clone(),
        vec![
            Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef,
            Arc::new(StringArray::from(vec!["x", "y"])),
        ],
        Some(NullBuffer::from(vec![true, false])),
    );
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("p", DataType::Struct(inner), true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![Arc::new(Int64Array::from(vec![10, 20])), Arc::new(p)],
    )
    .unwrap()
}

fn struct_of_struct_batch() -> RecordBatch {
    let leaf = Fields::from(vec![
        Field::new("z", DataType::Int64, true),
        Field::new("y", DataType::Utf8, true),
    ]);
    let inner = StructArray::new(
        leaf.clone(),
        vec![
            Arc::new(Int64Array::from(vec![5, 6])) as ArrayRef,
            Arc::new(StringArray::from(vec!["m", "n"])),
        ],
        None,
    );
    let middle = Fields::from(vec![
        Field::new("inner", DataType::Struct(leaf), true),
        Field::new("w", DataType::Int64, true),
    ]);
    let outer = StructArray::new(
        middle.clone(),
        vec![Arc::new(inner) as ArrayRef, Arc::new(Int64Array::from(vec![7, 8]))],
        None,
    );
    let schema = Arc::new(Schema::new(vec![
        Field::new("outer", DataType::Struct(middle), true),
        Field::new("after", DataType::Int64, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![Arc::new(outer), Arc::new(Int64Array::from(vec![0, 1]))],
    )
    .unwrap()
}

fn struct_with_list_batch() -> RecordBatch {
    let tags = ListArray::from_iter_primitive::<Int64Type, _, _>(vec![
        Some(vec![Some(1), Some(2)]),
        None,
        Some(vec![]),
    ]);
    let inner = Fields::from(vec![
        Field::new("tags", tags.data_type().clone(), true),
        Field::new("n", DataType::Int64, true),
    ]);
    let s = StructArray::new(
        inner.clone(),
        vec![
            Arc::new(tags) as ArrayRef,
            Arc::new(Int64Array::from(vec![1, 2, 3])),
        ],
        None,
    );
    let schema = Arc::new(Schema::new(vec![Field::new(
        "s",
        DataType::Struct(inner),
        true,
    )]));
    RecordBatch::try_new(schema, vec![Arc::new(s)]).unwrap()
}

fn dotted_name_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id.orig_h", DataType::Utf8, true),
        Field::new("id.resp_p", DataType::Int64, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["10.0.0.1", "10.0.0.2"])),
            Arc::new(Int64Array::from(vec![80, 443])),
        ],
    )
    .unwrap()
}

#[test]
fn test_doubling_end_to_end() {
    let output = run("record.x = record.x * 2;", &[flat_batch()]);

    let x = output[0].column(0).as_primitive::<Int64Type>();
    assert_eq!(x.values().to_vec(), vec![2, 4, 6]);
}

#[test]
fn test_noop_round_trip_identity() {
    for batch in [
        flat_batch(),
        struct_batch(),
        struct_of_struct_batch(),
        struct_with_list_batch(),
        dotted_name_batch(),
    ] {
        let output = run("let unused = 0;", &[batch.clone()]);
        assert_eq!(output[0], batch);
    }
}

#[test]
fn test_nan_noop_keeps_float32() {
    let schema = Arc::new(Schema::new(vec![Field::new("f", DataType::Float32, true)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float32Array::from(vec![Some(f32::NAN), Some(2.5), None]))],
    )
    .unwrap();

    let output = run("let unused = record.f;", &[batch.clone()]);

    assert_eq!(output[0].schema(), batch.schema());
    let f = output[0].column(0).as_primitive::<Float32Type>();
    assert!(f.value(0).is_nan());
    assert_eq!(f.value(1), 2.5);
    assert!(f.is_null(2));
}

#[test]
fn test_nested_noop_keeps_field_order() {
    let output = run("record", &[struct_of_struct_batch()]);

    let schema = output[0].schema();
    let top: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(top, vec!["outer", "after"]);
    let DataType::Struct(middle) = schema.field(0).data_type() else {
        panic!("expected a struct");
    };
    let names: Vec<&str> = middle.iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["inner", "w"]);
    let DataType::Struct(leaf) = middle[0].data_type() else {
        panic!("expected a struct");
    };
    let names: Vec<&str> = leaf.iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["z", "y"]);
}

#[test]
fn test_nested_change_inside_null_struct_row() {
    let output = run("record.p.a = 100;", &[struct_batch()]);

    let p = output[0].column_by_name("p").unwrap().as_struct();
    let a = p.column_by_name("a").unwrap().as_primitive::<Int64Type>();
    assert_eq!(a.values().to_vec(), vec![100, 100]);
    let b = p.column_by_name("b").unwrap();
    assert!(b.is_valid(0));
    assert!(b.is_null(1));
}

#[test]
fn test_schema_can_change_between_batches() {
    let output = run(
        r#"if record.x == 1 { record.label = "one"; } else { record.x = "many"; }"#,
        &[
            flat_batch().slice(0, 1),
            flat_batch().slice(1, 2),
        ],
    );

    assert_eq!(output.len(), 2);
    assert_eq!(output[0].num_columns(), 2);
    assert_eq!(output[0].column(1).data_type(), &DataType::Utf8);
    assert_eq!(output[1].column(0).data_type(), &DataType::Utf8);
    assert_eq!(output[1].num_rows(), 2);
}

#[test]
fn test_extension_columns_survive() {
    let addresses = IpCodec::pack_array(&[
        Some("10.1.21.165".parse().unwrap()),
        Some("fe80::1ff:fe23:4567:890a".parse().unwrap()),
    ])
    .unwrap();
    let networks = SubnetCodec::pack_array(&[
        Some("10.1.20.0/25".parse().unwrap()),
        None,
    ])
    .unwrap();
    let schema = Arc::new(Schema::new(vec![
        IpCodec::field("src"),
        SubnetCodec::field("net"),
    ]));
    let batch =
        RecordBatch::try_new(schema, vec![Arc::new(addresses), Arc::new(networks)]).unwrap();

    let output = run("record.v4 = record.src.is_v4();", &[batch.clone()]);

    assert_eq!(output[0].column(0), batch.column(0));
    assert_eq!(output[0].column(1), batch.column(1));
    assert_eq!(output[0].schema().field(1), batch.schema().field(1));
    let v4 = output[0].column_by_name("v4").unwrap().as_boolean();
    assert!(v4.value(0));
    assert!(!v4.value(1));
}

#[test]
fn test_empty_output_fails() {
    let mut output = Vec::new();
    let result = serve(
        Cursor::new(encode(&[flat_batch()])),
        &mut output,
        &script("record = #{};"),
    );

    assert!(matches!(
        result,
        Err(RbError::Transform(TransformError::EmptyRowOutput { row: 0 }))
    ));
    assert!(output.is_empty());
}

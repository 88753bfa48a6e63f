use super::*;
use crate::error::PostmanError;
use crate::memory::{default_pool, BoundedPool, MemoryPool};
use crate::table::{build_table, BuildOptions, Column, FieldSpec, Table};
use crate::types::{ColumnType, Value};
use crate::utils::typed_slice_to_bytes;
use arrow::array::{BooleanArray, Int32Array, StringArray};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

//==================================================================================
// Helpers
//==================================================================================

fn four_column_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("c1", ColumnType::Int32),
        FieldSpec::new("c2", ColumnType::Int64),
        FieldSpec::new("c3", ColumnType::Float64),
        FieldSpec::new("c4", ColumnType::Utf8),
    ]
}

fn four_column_table(trailing_null_row: bool) -> Table {
    let rows = vec![
        vec![
            Value::Int32(1),
            Value::Int64(10),
            Value::Float64(1.5),
            Value::from("a"),
        ],
        vec![
            Value::Int32(2),
            Value::Int64(20),
            Value::Float64(2.5),
            Value::from("b"),
        ],
    ];
    let options = BuildOptions {
        trailing_null_row,
        ..Default::default()
    };
    build_table(&four_column_fields(), &rows, &options, default_pool()).unwrap()
}

fn round_trip_borrowed(column: &Column) -> Vec<Value> {
    let descriptor = export_column(column).unwrap();
    match import_array(descriptor).unwrap() {
        ImportedArray::Borrowed(view) => view.values().unwrap(),
        ImportedArray::Adopted(_) => panic!("borrowed export imported as adopted"),
    }
}

fn round_trip_adopted(column: Column) -> Column {
    let descriptor = export_column_owned(column).unwrap();
    let imported = import_array(descriptor).unwrap();
    assert!(!imported.is_borrowed());
    imported.into_column().unwrap()
}

/// An address inside `backing` that is not 4-byte aligned.
fn misaligned_offset(backing: &[u8]) -> usize {
    let base = backing.as_ptr() as usize;
    if (base + 1) % 4 != 0 {
        1
    } else {
        2
    }
}

//==================================================================================
// Round Trips
//==================================================================================

#[test]
fn test_trailing_null_row_survives_the_bridge() {
    let table = four_column_table(true);
    assert_eq!(table.num_rows(), 3);

    let c1 = round_trip_borrowed(table.column(0).unwrap());
    assert_eq!(c1, vec![Value::Int32(1), Value::Int32(2), Value::Null]);

    let c2 = round_trip_borrowed(table.column(1).unwrap());
    assert_eq!(c2, vec![Value::Int64(10), Value::Int64(20), Value::Null]);

    let c3 = round_trip_borrowed(table.column(2).unwrap());
    assert_eq!(c3, vec![Value::Float64(1.5), Value::Float64(2.5), Value::Null]);

    let c4 = round_trip_borrowed(table.column(3).unwrap());
    assert_eq!(c4, vec![Value::from("a"), Value::from("b"), Value::Null]);
}

#[test]
fn test_all_valid_columns_export_without_validity() {
    let table = four_column_table(false);
    for column in table.columns() {
        let descriptor = export_column(column).unwrap();
        assert!(!descriptor.raw().has_validity());
        assert_eq!(descriptor.raw().validity_len, 0);
    }
}

#[test]
fn test_adopted_round_trip_equals_original() {
    let table = four_column_table(true);
    for column in table.columns() {
        let imported = round_trip_adopted(column.clone());
        assert_eq!(&imported, column);
    }
}

#[test]
fn test_randomized_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let fields = four_column_fields();
    let rows: Vec<Vec<Value>> = (0..500)
        .map(|_| {
            let mut row = Vec::with_capacity(4);
            row.push(if rng.random_bool(0.2) {
                Value::Null
            } else {
                Value::Int32(rng.random_range(-1000..1000))
            });
            row.push(if rng.random_bool(0.2) {
                Value::Null
            } else {
                Value::Int64(rng.random_range(i64::MIN / 2..i64::MAX / 2))
            });
            row.push(if rng.random_bool(0.2) {
                Value::Null
            } else {
                Value::Float64(rng.random_range(-1.0e6..1.0e6))
            });
            row.push(if rng.random_bool(0.2) {
                Value::Null
            } else {
                let len = rng.random_range(0..12);
                Value::Utf8((0..len).map(|_| rng.random_range('a'..='z')).collect())
            });
            row
        })
        .collect();

    let table = build_table(&fields, &rows, &BuildOptions::default(), default_pool()).unwrap();
    for (index, column) in table.columns().iter().enumerate() {
        let expected: Vec<Value> = rows.iter().map(|row| row[index].clone()).collect();
        assert_eq!(round_trip_borrowed(column), expected);
        assert_eq!(round_trip_adopted(column.clone()).values().unwrap(), expected);
    }
}

#[test]
fn test_multibyte_text_and_special_floats_round_trip() {
    let fields = vec![
        FieldSpec::new("x", ColumnType::Float64),
        FieldSpec::new("label", ColumnType::Utf8),
    ];
    let rows = vec![
        vec![Value::Float64(f64::NAN), Value::from("héllo")],
        vec![Value::Float64(f64::INFINITY), Value::from("日本語")],
        vec![Value::Float64(-0.0), Value::from("🦀")],
        vec![Value::Null, Value::from("")],
        vec![Value::Float64(f64::NEG_INFINITY), Value::Null],
    ];
    let table = build_table(&fields, &rows, &BuildOptions::default(), default_pool()).unwrap();

    let text = table.column(1).unwrap();
    let expected: Vec<Value> = rows.iter().map(|row| row[1].clone()).collect();
    assert_eq!(round_trip_borrowed(text), expected);
    assert_eq!(round_trip_adopted(text.clone()).values().unwrap(), expected);
    let raw = *export_column(text).unwrap().raw();
    assert_eq!(raw.secondary_len as usize, "héllo日本語🦀".len());

    let floats = table.column(0).unwrap();
    for values in [
        round_trip_borrowed(floats),
        round_trip_adopted(floats.clone()).values().unwrap(),
    ] {
        assert_eq!(values.len(), 5);
        assert!(matches!(values[0], Value::Float64(v) if v.is_nan()));
        assert_eq!(values[1], Value::Float64(f64::INFINITY));
        assert!(matches!(values[2], Value::Float64(v) if v == 0.0 && v.is_sign_negative()));
        assert_eq!(values[3], Value::Null);
        assert_eq!(values[4], Value::Float64(f64::NEG_INFINITY));
    }
}

#[test]
fn test_export_table_column_by_index() {
    let table = four_column_table(false);
    let descriptor = export_table_column(&table, 3).unwrap();
    assert_eq!(descriptor.raw().type_tag, ColumnType::Utf8.tag());

    let result = export_table_column(&table, 4);
    assert!(matches!(result, Err(PostmanError::SchemaMismatch(_))));
}

//==================================================================================
// Zero-Copy and Ownership
//==================================================================================

#[test]
fn test_export_is_idempotent() {
    let table = four_column_table(true);
    let column = table.column(3).unwrap();
    let first = *export_column(column).unwrap().raw();
    let second = *export_column(column).unwrap().raw();
    assert_eq!(first, second);
}

#[test]
fn test_borrowed_import_shares_memory() {
    let table = four_column_table(true);
    for column in table.columns() {
        let descriptor = export_column(column).unwrap();
        let original = *descriptor.raw();
        match import_array(descriptor).unwrap() {
            ImportedArray::Borrowed(view) => assert_eq!(view.describe().unwrap(), original),
            ImportedArray::Adopted(_) => panic!("expected a borrowed view"),
        }
    }
}

#[test]
fn test_adopted_import_shares_memory() {
    let table = four_column_table(true);
    let column = table.column(0).unwrap().clone();
    let descriptor = export_column_owned(column).unwrap();
    let original = *descriptor.raw();
    let imported = import_array(descriptor).unwrap().into_column().unwrap();
    assert_eq!(describe(imported.array()).unwrap(), original);
}

#[test]
fn test_adopted_memory_is_released_when_importer_drops_it() {
    let pool = Arc::new(BoundedPool::new(1 << 20));
    let handle: Arc<dyn MemoryPool> = pool.clone();
    let fields = vec![FieldSpec::new("v", ColumnType::Int64)];
    let rows = vec![vec![Value::Int64(7)], vec![Value::Null]];
    let table = build_table(&fields, &rows, &BuildOptions::default(), handle).unwrap();

    let column = table.column(0).unwrap().clone();
    drop(table);
    let imported = round_trip_adopted(column);
    assert!(pool.reserved() > 0);
    assert_eq!(imported.values().unwrap(), vec![Value::Int64(7), Value::Null]);

    drop(imported);
    assert_eq!(pool.reserved(), 0);
}

#[test]
fn test_released_borrow_is_an_ownership_violation() {
    let table = four_column_table(true);
    let column = table.column(1).unwrap();
    let raw = *export_column(column).unwrap().raw();

    let signal = ReleaseSignal::new();
    let lease = Lease::scoped(column).with_signal(signal.clone());
    let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, lease.clone()) };
    let view = match import_array(descriptor).unwrap() {
        ImportedArray::Borrowed(view) => view,
        ImportedArray::Adopted(_) => panic!("expected a borrowed view"),
    };
    assert_eq!(view.value(0).unwrap(), Some(Value::Int64(10)));

    signal.release();
    assert!(matches!(view.value(0), Err(PostmanError::OwnershipViolation(_))));
    assert!(matches!(view.to_column(), Err(PostmanError::OwnershipViolation(_))));
    // Length is metadata and stays readable.
    assert_eq!(view.len(), 3);

    let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, lease) };
    assert!(matches!(
        import_array(descriptor),
        Err(PostmanError::OwnershipViolation(_))
    ));
}

#[test]
fn test_view_to_column_copies() {
    let table = four_column_table(true);
    let column = table.column(3).unwrap();
    let copy = match import_array(export_column(column).unwrap()).unwrap() {
        ImportedArray::Borrowed(view) => {
            assert!(view.same_as(column).unwrap());
            view.to_column().unwrap()
        }
        ImportedArray::Adopted(_) => panic!("expected a borrowed view"),
    };
    assert_eq!(&copy, column);
    assert_ne!(
        describe(copy.array()).unwrap().secondary_ptr,
        describe(column.array()).unwrap().secondary_ptr
    );
}

//==================================================================================
// Rejections
//==================================================================================

#[test]
fn test_export_unsupported_type() {
    let column = Column::from_array(Arc::new(BooleanArray::from(vec![true, false])));
    assert!(matches!(
        export_column(&column),
        Err(PostmanError::UnsupportedType(_))
    ));
}

#[test]
fn test_import_unknown_tag() {
    let raw = RawDescriptor {
        type_tag: 7,
        ..Default::default()
    };
    let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, Lease::scoped(&())) };
    assert!(matches!(
        import_array(descriptor),
        Err(PostmanError::UnsupportedType(_))
    ));
}

#[test]
fn test_import_rejects_inconsistent_lengths() {
    let table = four_column_table(true);
    let column = table.column(0).unwrap();
    let valid = *export_column(column).unwrap().raw();

    let import = |raw: RawDescriptor| {
        let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, Lease::scoped(column)) };
        import_array(descriptor).map(|imported| imported.len())
    };

    assert_eq!(import(valid).unwrap(), 3);
    assert!(matches!(
        import(RawDescriptor { length: -1, ..valid }),
        Err(PostmanError::InvalidLength(_))
    ));
    assert!(matches!(
        import(RawDescriptor { validity_len: 2, ..valid }),
        Err(PostmanError::InvalidLength(_))
    ));
    assert!(matches!(
        import(RawDescriptor { data_len: valid.data_len + 4, ..valid }),
        Err(PostmanError::InvalidLength(_))
    ));
    assert!(matches!(
        import(RawDescriptor { data_ptr: 0, ..valid }),
        Err(PostmanError::InvalidLength(_))
    ));
    assert!(matches!(
        import(RawDescriptor { secondary_len: 8, ..valid }),
        Err(PostmanError::InvalidLength(_))
    ));
}

#[test]
fn test_import_rejects_validity_length_without_pointer() {
    let table = four_column_table(false);
    let column = table.column(1).unwrap();
    let valid = *export_column(column).unwrap().raw();
    assert_eq!(valid.validity_ptr, 0);

    let raw = RawDescriptor {
        validity_len: 1,
        ..valid
    };
    let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, Lease::scoped(column)) };
    assert!(matches!(
        import_array(descriptor),
        Err(PostmanError::InvalidLength(_))
    ));
}

#[test]
fn test_import_rejects_lengths_whose_byte_size_overflows() {
    let oversized = [
        (ColumnType::Utf8, i64::MAX),
        (ColumnType::Int64, 1 << 61),
        (ColumnType::Int32, 1 << 62),
    ];
    for (column_type, length) in oversized {
        let raw = RawDescriptor {
            type_tag: column_type.tag(),
            length,
            ..Default::default()
        };
        let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, Lease::scoped(&())) };
        assert!(
            matches!(import_array(descriptor), Err(PostmanError::InvalidLength(_))),
            "{} array of length {}",
            column_type,
            length
        );
    }
}

#[test]
fn test_import_rejects_offsets_past_character_data() {
    let table = four_column_table(false);
    let column = table.column(3).unwrap();
    let valid = *export_column(column).unwrap().raw();
    assert_eq!(valid.secondary_len, 2);

    let raw = RawDescriptor {
        secondary_len: 1,
        ..valid
    };
    let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, Lease::scoped(column)) };
    assert!(matches!(
        import_array(descriptor),
        Err(PostmanError::InvalidLength(_))
    ));
}

#[test]
fn test_misaligned_buffer_is_copied_or_rejected() {
    let values: [i32; 3] = [11, -22, 33];
    let mut backing = vec![0u8; 16];
    let offset = misaligned_offset(&backing);
    backing[offset..offset + 12].copy_from_slice(&typed_slice_to_bytes(&values));
    let address = backing.as_ptr() as u64 + offset as u64;
    let raw = RawDescriptor {
        type_tag: ColumnType::Int32.tag(),
        length: 3,
        data_ptr: address,
        data_len: 12,
        ..Default::default()
    };

    let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, Lease::scoped(&backing)) };
    let rejected = import_array_with(descriptor, AlignmentPolicy::Reject);
    assert!(matches!(
        rejected,
        Err(PostmanError::MisalignedBuffer { buffer: "data", .. })
    ));

    let descriptor = unsafe { ArrayDescriptor::borrowed_from_raw(raw, Lease::scoped(&backing)) };
    let view = match import_array(descriptor).unwrap() {
        ImportedArray::Borrowed(view) => view,
        ImportedArray::Adopted(_) => panic!("expected a borrowed view"),
    };
    assert_eq!(
        view.values().unwrap(),
        vec![Value::Int32(11), Value::Int32(-22), Value::Int32(33)]
    );
    assert_ne!(view.describe().unwrap().data_ptr, address);
}

//==================================================================================
// Slices and Empty Columns
//==================================================================================

#[test]
fn test_byte_aligned_slice_round_trips() {
    let array = Int32Array::from_iter((0..20).map(|i| if i % 3 == 0 { None } else { Some(i) }));
    let column = Column::from_array(Arc::new(array.slice(8, 5)));
    let expected = column.values().unwrap();
    assert_eq!(round_trip_borrowed(&column), expected);
}

#[test]
fn test_unaligned_validity_slice_is_rejected() {
    let array = Int32Array::from(vec![Some(1), None, Some(3), Some(4), None]);
    let column = Column::from_array(Arc::new(array.slice(1, 3)));
    assert!(matches!(
        export_column(&column),
        Err(PostmanError::InvalidLength(_))
    ));
}

#[test]
fn test_unaligned_slice_without_nulls_round_trips() {
    let array = Int32Array::from(vec![1, 2, 3, 4, 5]);
    let column = Column::from_array(Arc::new(array.slice(1, 3)));
    assert_eq!(
        round_trip_borrowed(&column),
        vec![Value::Int32(2), Value::Int32(3), Value::Int32(4)]
    );
}

#[test]
fn test_sliced_strings_round_trip() {
    let array = StringArray::from(vec![Some("zero"), Some("one"), Some("two"), Some("three")]);
    let column = Column::from_array(Arc::new(array.slice(1, 2)));
    assert_eq!(
        round_trip_borrowed(&column),
        vec![Value::from("one"), Value::from("two")]
    );
}

#[test]
fn test_zero_length_columns_round_trip() {
    let table = build_table(
        &four_column_fields(),
        &[],
        &BuildOptions::default(),
        default_pool(),
    )
    .unwrap();
    assert_eq!(table.num_rows(), 0);
    for column in table.columns() {
        let descriptor = export_column(column).unwrap();
        assert_eq!(descriptor.raw().length, 0);
        let imported = import_array(descriptor).unwrap();
        assert!(imported.is_empty());
        assert_eq!(imported.into_column().unwrap().null_count(), 0);
    }
}

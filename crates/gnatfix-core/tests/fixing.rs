//! Tests for the type fixing engine

use gimli::RunTimeEndian;
use gnatfix_core::config::EngineConfig;
use gnatfix_core::error::GnatError;
use gnatfix_core::fixing::{DegradationKind, Evaluation, RecordingSink};
use gnatfix_core::layout::bits::{pack, write_integer};
use gnatfix_core::memory::FlatMemory;
use gnatfix_core::symbols::{ImageId, ResolverContext, StaticDirectory, Symbol};
use gnatfix_core::types::{Address, Contents, Field, Kind, TypeArena, TypeDescriptor, TypeId, Value};
use pretty_assertions::assert_eq;

const LITTLE: RunTimeEndian = RunTimeEndian::Little;

/// Everything a debugger would hand to the engine.
struct Program
{
    arena: TypeArena,
    directory: StaticDirectory,
    memory: FlatMemory,
    context: ResolverContext,
    integer: TypeId,
}

impl Program
{
    fn new() -> Self
    {
        let mut arena = TypeArena::new();
        let integer = arena.add(TypeDescriptor::int("integer", 4, true));
        Self {
            arena,
            directory: StaticDirectory::new(),
            memory: FlatMemory::new(),
            context: ResolverContext::new(),
            integer,
        }
    }

    fn add(&mut self, descriptor: TypeDescriptor) -> TypeId
    {
        self.arena.add(descriptor)
    }

    /// Add a type that the directory can find by name.
    fn declare(&mut self, descriptor: TypeDescriptor) -> TypeId
    {
        let name = descriptor.name().map(str::to_string);
        let id = self.arena.add(descriptor);
        if let Some(name) = name {
            self.directory.add_type(name, id);
        }
        id
    }

    /// An integer variable stored at `address`.
    fn variable(&mut self, name: &str, address: u64, value: i64)
    {
        self.memory.map(Address::new(address), write_integer(value, 4, LITTLE));
        self.directory.add_variable(Symbol::new(name, self.integer, Address::new(address)));
    }

    fn evaluation(&mut self, config: EngineConfig) -> Evaluation<'_>
    {
        Evaluation::new(
            &mut self.arena,
            &self.directory,
            &self.memory,
            &mut self.context,
            ImageId::from(1),
            config,
        )
    }
}

fn field_names(evaluation: &Evaluation<'_>, ty: TypeId) -> Vec<String>
{
    evaluation.arena().get(ty).fields().iter().map(|field| field.name.clone()).collect()
}

fn int_bytes(values: &[i64]) -> Vec<u8>
{
    values.iter().flat_map(|value| write_integer(*value, 4, LITTLE)).collect()
}

struct VariantRecord
{
    record: TypeId,
    union: TypeId,
    single: TypeId,
}

/// `type Rec (Kind : Integer) is record case Kind is when 1 => A; when 2..5 => B, C; when others => null;`
fn variant_record(program: &mut Program) -> VariantRecord
{
    let integer = program.integer;
    let short = program.add(TypeDescriptor::int("short_integer", 2, true));
    let single = program.add(TypeDescriptor::record("pkg__rec__S1", vec![Field::new("a", integer, 0)], 4));
    let range = program.add(TypeDescriptor::record(
        "pkg__rec__R2T5",
        vec![Field::new("b", short, 0), Field::new("c", short, 16)],
        4,
    ));
    let others = program.add(TypeDescriptor::record("pkg__rec__O", Vec::new(), 0));
    let union = program.add(TypeDescriptor::union(
        "pkg__rec___kind___XVN",
        vec![Field::new("S1", single, 0), Field::new("R2T5", range, 0), Field::new("O", others, 0)],
        4,
    ));
    let record = program.declare(TypeDescriptor::record(
        "pkg__rec",
        vec![Field::new("kind", integer, 0), Field::new("variants", union, 32)],
        8,
    ));
    VariantRecord { record, union, single }
}

#[test]
fn test_variant_selection()
{
    let mut program = Program::new();
    let fixture = variant_record(&mut program);
    let mut evaluation = program.evaluation(EngineConfig::default());

    let contents = Contents::from_bytes(int_bytes(&[3, 0x0002_0001]));
    let fixed = evaluation.fix_type(fixture.record, &contents, None).unwrap();
    assert_eq!(field_names(&evaluation, fixed), vec!["kind", "b", "c"]);
    assert_eq!(evaluation.arena().size_of(fixed), 8);

    let contents = Contents::from_bytes(int_bytes(&[1, 42]));
    let fixed = evaluation.fix_type(fixture.record, &contents, None).unwrap();
    assert_eq!(field_names(&evaluation, fixed), vec!["kind", "a"]);
    let value = Value::new(fixed, contents);
    let a = evaluation.read_named_field(&value, "a").unwrap().unwrap();
    assert_eq!(evaluation.value_as_long(&a).unwrap(), 42);

    let contents = Contents::from_bytes(int_bytes(&[9, 0]));
    let fixed = evaluation.fix_type(fixture.record, &contents, None).unwrap();
    assert_eq!(field_names(&evaluation, fixed), vec!["kind"]);
    assert_eq!(evaluation.arena().size_of(fixed), 4);

    assert!(!evaluation.is_degraded());
}

#[test]
fn test_branch_fields_are_placed_after_the_discriminant()
{
    let mut program = Program::new();
    let fixture = variant_record(&mut program);
    let mut evaluation = program.evaluation(EngineConfig::default());

    let contents = Contents::from_bytes(int_bytes(&[4, 0x0007_0005]));
    let fixed = evaluation.fix_type(fixture.record, &contents, None).unwrap();
    let value = Value::new(fixed, contents);

    let b = evaluation.read_named_field(&value, "b").unwrap().unwrap();
    let c = evaluation.read_named_field(&value, "c").unwrap().unwrap();
    assert_eq!(evaluation.value_as_long(&b).unwrap(), 5);
    assert_eq!(evaluation.value_as_long(&c).unwrap(), 7);
    let positions: Vec<u64> = evaluation.arena().get(fixed).fields().iter().map(|field| field.bit_pos).collect();
    assert_eq!(positions, vec![0, 32, 48]);
}

#[test]
fn test_standalone_union_uses_dval()
{
    let mut program = Program::new();
    let fixture = variant_record(&mut program);
    let mut evaluation = program.evaluation(EngineConfig::default());

    let contents = Contents::from_bytes(int_bytes(&[1, 42]));
    let dval = Value::new(fixture.record, contents.clone());
    let branch = evaluation.fix_type(fixture.union, &contents.offset_by(4), Some(&dval)).unwrap();
    assert_eq!(branch, fixture.single);

    // Without discriminants the union is left alone.
    assert_eq!(evaluation.fix_type(fixture.union, &contents, None).unwrap(), fixture.union);
}

#[test]
fn test_fixing_is_idempotent()
{
    let mut program = Program::new();
    let fixture = variant_record(&mut program);
    let integer = program.integer;
    let mut evaluation = program.evaluation(EngineConfig::default());

    let contents = Contents::from_bytes(int_bytes(&[3, 0]));
    let once = evaluation.fix_type(fixture.record, &contents, None).unwrap();
    let arena_len = evaluation.arena().len();
    let twice = evaluation.fix_type(once, &contents, None).unwrap();
    assert_eq!(once, twice);
    assert_eq!(evaluation.arena().len(), arena_len);

    // Types that need no fixing come back as themselves.
    assert_eq!(evaluation.fix_type(integer, &Contents::none(), None).unwrap(), integer);
}

#[test]
fn test_fix_value_fetches_the_fixed_size()
{
    let mut program = Program::new();
    let fixture = variant_record(&mut program);
    program.memory.map(Address::new(0x1000), int_bytes(&[9, -1]));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let fixed = evaluation.fix_value(&Value::at(fixture.record, Address::new(0x1000))).unwrap();
    assert_eq!(fixed.bytes().map(<[u8]>::len), Some(4));
    assert_eq!(fixed.address(), Some(Address::new(0x1000)));
    assert_eq!(field_names(&evaluation, fixed.ty()), vec!["kind"]);
}

#[test]
fn test_unchecked_union_keeps_every_member()
{
    let mut program = Program::new();
    let integer = program.integer;
    let float = program.add(TypeDescriptor::float("float", 4));
    let union = program.add(TypeDescriptor::new(
        None,
        Kind::Union {
            fields: vec![Field::new("i", integer, 0), Field::new("f", float, 0)],
        },
        4,
    ));
    let record = program.add(TypeDescriptor::record("pkg__raw", vec![Field::new("u", union, 0)], 4));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let fixed = evaluation.fix_type(record, &Contents::from_bytes(int_bytes(&[7])), None).unwrap();
    assert_eq!(field_names(&evaluation, fixed), vec!["u"]);
    assert_eq!(evaluation.arena().size_of(fixed), 4);
    assert!(!evaluation.is_degraded());
}

#[test]
fn test_missing_discriminant_degrades()
{
    let mut program = Program::new();
    let integer = program.integer;
    let single = program.add(TypeDescriptor::record("pkg__odd__S1", vec![Field::new("a", integer, 0)], 4));
    let union = program.add(TypeDescriptor::union("pkg__odd___mode___XVN", vec![Field::new("S1", single, 0)], 4));
    let record = program.add(TypeDescriptor::record(
        "pkg__odd",
        vec![Field::new("kind", integer, 0), Field::new("variants", union, 32)],
        8,
    ));
    let sink = RecordingSink::new();
    let mut evaluation = program.evaluation(EngineConfig::default()).with_sink(&sink);

    let fixed = evaluation.fix_type(record, &Contents::from_bytes(int_bytes(&[1, 0])), None).unwrap();
    assert_eq!(field_names(&evaluation, fixed), vec!["kind"]);
    assert_eq!(evaluation.warnings()[0].kind, DegradationKind::UnsupportedVariant);
    assert!(matches!(evaluation.warnings()[0].cause, Some(GnatError::UnsupportedVariant(_))));
    assert_eq!(sink.messages().len(), 1);
}

#[test]
fn test_packed_array_sizing()
{
    let mut program = Program::new();
    let integer = program.integer;
    let element = program.add(TypeDescriptor::range("pkg__small", integer, 0, 7, 1));
    let index = program.add(TypeDescriptor::range("pkg__idx", integer, 1, 10, 4));
    program.declare(TypeDescriptor::array(Some("pkg__arr".to_string()), element, index, 10));
    let packed = program.add(TypeDescriptor::int("pkg__arr___XP3", 4, false));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let fixed = evaluation.fix_type(packed, &Contents::none(), None).unwrap();
    assert_eq!(evaluation.arena().size_of(fixed), 4);
    match evaluation.arena().kind(fixed) {
        Kind::Array { element_bits, element: inner, .. } => {
            assert_eq!(*element_bits, 3);
            assert_eq!(*inner, element);
        }
        other => panic!("expected an array, found {other:?}"),
    }
}

#[test]
fn test_packed_element_extraction()
{
    let mut program = Program::new();
    let integer = program.integer;
    let element = program.add(TypeDescriptor::range("pkg__small", integer, 0, 7, 1));
    let index = program.add(TypeDescriptor::range("pkg__idx", integer, 1, 10, 4));
    let shadow = program.declare(TypeDescriptor::array(Some("pkg__arr".to_string()), element, index, 10));
    let packed = program.add(TypeDescriptor::int("pkg__arr___XP3", 4, false));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let mut bytes = vec![0u8; 4];
    for (position, value) in [1u8, 2, 3, 4, 5, 6, 7, 0, 1, 2].iter().enumerate() {
        pack(&mut bytes, position * 3, &[*value], 0, 3, LITTLE).unwrap();
    }
    let fixed = evaluation.fix_type(packed, &Contents::none(), None).unwrap();
    let array = Value::from_bytes(fixed, bytes);

    let third = evaluation.packed_element(&array, &[3]).unwrap();
    assert_eq!(evaluation.value_as_long(&third).unwrap(), 3);
    let seventh = evaluation.packed_element(&array, &[7]).unwrap();
    assert_eq!(evaluation.value_as_long(&seventh).unwrap(), 7);
    assert!(!evaluation.is_degraded());

    assert!(matches!(
        evaluation.packed_element(&array, &[0]),
        Err(GnatError::InvalidArgument(_))
    ));
    assert_eq!(evaluation.warnings()[0].kind, DegradationKind::IndexOutOfBounds);

    let plain = Value::from_bytes(shadow, vec![0; 10]);
    assert!(matches!(
        evaluation.packed_element(&plain, &[1]),
        Err(GnatError::InvalidArgument(_))
    ));
}

#[test]
fn test_packed_element_with_huge_index_fails_cleanly()
{
    let mut program = Program::new();
    let integer = program.integer;
    let element = program.add(TypeDescriptor::range("pkg__small", integer, 0, 7, 1));
    let index = program.add(TypeDescriptor::range("pkg__idx", integer, 1, 10, 4));
    program.declare(TypeDescriptor::array(Some("pkg__arr".to_string()), element, index, 10));
    let packed = program.add(TypeDescriptor::int("pkg__arr___XP3", 4, false));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let fixed = evaluation.fix_type(packed, &Contents::none(), None).unwrap();
    let array = Value::from_bytes(fixed, vec![0; 4]);

    assert!(matches!(
        evaluation.packed_element(&array, &[i64::MAX]),
        Err(GnatError::InvalidArgument(_))
    ));
    assert_eq!(evaluation.warnings()[0].kind, DegradationKind::IndexOutOfBounds);

    // Past the end but without overflow, the read itself fails.
    assert!(evaluation.packed_element(&array, &[1_000]).is_err());
}

#[test]
fn test_component_reads_respect_the_size_limit()
{
    let mut program = Program::new();
    let character = program.add(TypeDescriptor::character("character", 1));
    let integer = program.integer;
    let index = program.add(TypeDescriptor::range("pkg__idx", integer, 1, 1 << 20, 4));
    let blob = program.add(TypeDescriptor::array(Some("pkg__blob".to_string()), character, index, 1 << 20));
    let holder = program.add(TypeDescriptor::record(
        "pkg__holder",
        vec![Field::packed("data", blob, 3, 0)],
        16,
    ));
    let wide = program.add(TypeDescriptor::int("pkg__wide", 1 << 20, false));
    let evaluation = program.evaluation(EngineConfig::default());

    let value = Value::from_bytes(holder, vec![0; 16]);
    assert_eq!(
        evaluation.read_named_field(&value, "data"),
        Err(GnatError::SizeLimitExceeded {
            size: 1 << 20,
            limit: 65536
        })
    );

    let scalar = Value::from_bytes(wide, vec![0; 8]);
    assert!(matches!(
        evaluation.value_as_long(&scalar),
        Err(GnatError::SizeLimitExceeded { .. })
    ));
}

#[test]
fn test_template_with_non_ascii_component_names()
{
    let mut program = Program::new();
    let integer = program.integer;
    program.declare(TypeDescriptor::record(
        "pkg__uni___XVE",
        vec![Field::new("n", integer, 0), Field::new("a\u{e9}\u{e9}\u{20ac}1", integer, 0)],
        8,
    ));
    let record = program.declare(TypeDescriptor::record("pkg__uni", vec![Field::new("n", integer, 0)], 4));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let fixed = evaluation
        .fix_type(record, &Contents::from_bytes(int_bytes(&[1, 2])), None)
        .unwrap();
    assert_eq!(field_names(&evaluation, fixed), vec!["n".to_string(), "a\u{e9}\u{e9}\u{20ac}1".to_string()]);
    assert_eq!(evaluation.arena().size_of(fixed), 8);
}

#[test]
fn test_missing_shadow_type_degrades()
{
    let mut program = Program::new();
    let packed = program.add(TypeDescriptor::int("pkg__lost___XP3", 4, false));
    let mut evaluation = program.evaluation(EngineConfig::default());

    assert_eq!(evaluation.fix_type(packed, &Contents::none(), None).unwrap(), packed);
    assert_eq!(evaluation.warnings()[0].kind, DegradationKind::MissingParallelType);
    assert_eq!(
        evaluation.warnings()[0].cause,
        Some(GnatError::MissingParallelType {
            name: "pkg__lost".to_string(),
            suffix: ""
        })
    );
}

#[test]
fn test_unreadable_bit_size_is_a_malformed_encoding()
{
    let mut program = Program::new();
    let integer = program.integer;
    let index = program.add(TypeDescriptor::range("pkg__idx", integer, 1, 4, 4));
    program.declare(TypeDescriptor::array(Some("pkg__arr".to_string()), integer, index, 16));
    let packed = program.add(TypeDescriptor::int("pkg__arr___XPx", 4, false));
    let mut evaluation = program.evaluation(EngineConfig::default());

    assert_eq!(evaluation.fix_type(packed, &Contents::none(), None).unwrap(), packed);
    let warning = &evaluation.warnings()[0];
    assert_eq!(warning.kind, DegradationKind::MalformedEncoding);
    assert_eq!(warning.cause, Some(GnatError::MalformedEncoding("pkg__arr___XPx".to_string())));
    assert!(warning.message.contains("bit size"));
}

#[test]
fn test_size_limit_is_enforced()
{
    let mut program = Program::new();
    let integer = program.integer;
    let element = program.add(TypeDescriptor::range("pkg__small", integer, 0, 7, 1));
    let index = program.add(TypeDescriptor::range("pkg__idx", integer, 1, 10, 4));
    program.declare(TypeDescriptor::array(Some("pkg__arr".to_string()), element, index, 10));
    let packed = program.add(TypeDescriptor::int("pkg__arr___XP3", 4, false));
    let mut evaluation = program.evaluation(EngineConfig::default().with_max_object_size(2));

    assert_eq!(
        evaluation.fix_type(packed, &Contents::none(), None),
        Err(GnatError::SizeLimitExceeded { size: 4, limit: 2 })
    );
}

#[test]
fn test_discriminant_dependent_range()
{
    let mut program = Program::new();
    let integer = program.integer;
    let bounded = program.add(TypeDescriptor::range("pkg__rec__T1___XDLU_1__n", integer, 0, 0, 4));
    let negative = program.add(TypeDescriptor::range("pkg__rec__T2___XDLU_5m__3", integer, 0, 0, 4));
    let holder = program.add(TypeDescriptor::record("pkg__rec", vec![Field::new("n", integer, 0)], 4));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let dval = Value::from_bytes(holder, int_bytes(&[5]));
    let fixed = evaluation.fix_type(bounded, &Contents::none(), Some(&dval)).unwrap();
    assert_eq!(evaluation.arena().discrete_bounds(fixed), Some((1, 5)));
    assert_eq!(evaluation.arena().name(fixed), Some("pkg__rec__T1___XDLU_1__n"));
    assert!(evaluation.arena().get(fixed).is_fixed());

    let fixed = evaluation.fix_type(negative, &Contents::none(), None).unwrap();
    assert_eq!(evaluation.arena().discrete_bounds(fixed), Some((-5, 3)));

    // A discriminant that cannot be found leaves the range as declared.
    let empty = Value::from_bytes(holder, int_bytes(&[5])).with_type(integer);
    assert_eq!(evaluation.fix_type(bounded, &Contents::none(), Some(&empty)).unwrap(), bounded);
}

#[test]
fn test_range_bounds_from_variables()
{
    let mut program = Program::new();
    let integer = program.integer;
    let dynamic = program.add(TypeDescriptor::range("pkg__var___XD", integer, 0, 0, 4));
    program.variable("pkg__var___L", 0x5000, 2);
    program.variable("pkg__var___U", 0x5010, 9);
    let mut evaluation = program.evaluation(EngineConfig::default());

    let fixed = evaluation.fix_type(dynamic, &Contents::none(), None).unwrap();
    assert_eq!(evaluation.arena().discrete_bounds(fixed), Some((2, 9)));
    assert!(!evaluation.is_degraded());
}

#[test]
fn test_warning_limit_caps_reports()
{
    let mut program = Program::new();
    let integer = program.integer;
    let dynamic = program.add(TypeDescriptor::range("pkg__dyn___XD", integer, 0, 0, 4));
    let sink = RecordingSink::new();
    let mut evaluation = program.evaluation(EngineConfig::default()).with_sink(&sink);

    let fixed = evaluation.fix_type(dynamic, &Contents::none(), None).unwrap();
    assert_eq!(evaluation.arena().discrete_bounds(fixed), Some((1, 1)));
    evaluation.fix_type(dynamic, &Contents::none(), None).unwrap();

    assert_eq!(
        sink.messages(),
        vec!["Unknown lower bound, using 1.".to_string(), "Unknown upper bound, using 1.".to_string()]
    );
    assert_eq!(evaluation.warnings().len(), 4);
    assert!(evaluation.warnings().iter().all(|warning| warning.kind == DegradationKind::UnknownBound));
}

/// `type Rec (N : Integer) is record Data : String (1 .. N); Z : Integer; end record;`
struct DynamicRecord
{
    record: TypeId,
}

fn dynamic_record(program: &mut Program) -> DynamicRecord
{
    let integer = program.integer;
    let character = program.add(TypeDescriptor::character("character", 1));
    let positive = program.add(TypeDescriptor::range("positive", integer, 1, i64::from(i32::MAX), 4));
    let data = program.declare(TypeDescriptor::array(Some("pkg__rec__T1".to_string()), character, positive, 0));
    let bounds = program.add(TypeDescriptor::range("pkg__rec__T1___XDLU_1__n", integer, 0, 0, 4));
    program.declare(TypeDescriptor::record("pkg__rec__T1___XA", vec![Field::new("idx", bounds, 0)], 0));
    let access = program.add(TypeDescriptor::pointer(None, data, 8));
    program.declare(TypeDescriptor::record(
        "pkg__rec___XVE",
        vec![
            Field::new("n", integer, 0),
            Field::new("data___XVL", access, 0),
            Field::new("z___XVA4", integer, 0),
        ],
        4,
    ));
    let record = program.declare(TypeDescriptor::record("pkg__rec", vec![Field::new("n", integer, 0)], 4));
    DynamicRecord { record }
}

fn dynamic_bytes() -> Vec<u8>
{
    let mut bytes = write_integer(5, 4, LITTLE);
    bytes.extend_from_slice(b"hello\0\0\0");
    bytes.extend(write_integer(42, 4, LITTLE));
    bytes
}

#[test]
fn test_record_template_with_dynamic_component()
{
    let mut program = Program::new();
    let fixture = dynamic_record(&mut program);
    let mut evaluation = program.evaluation(EngineConfig::default());

    let value = evaluation
        .fix_value(&Value::from_bytes(fixture.record, dynamic_bytes()))
        .unwrap();
    let fixed = value.ty();
    assert_eq!(field_names(&evaluation, fixed), vec!["n", "data___XVL", "z___XVA4"]);
    assert_eq!(evaluation.arena().name(fixed), Some("pkg__rec"));
    assert_eq!(evaluation.arena().size_of(fixed), 16);

    let positions: Vec<u64> = evaluation.arena().get(fixed).fields().iter().map(|field| field.bit_pos).collect();
    assert_eq!(positions, vec![0, 32, 96]);

    let data = evaluation.read_named_field(&value, "data").unwrap().unwrap();
    assert_eq!(evaluation.arena().size_of(data.ty()), 5);
    assert_eq!(data.bytes().map(|bytes| &bytes[..5]), Some(&b"hello"[..]));

    let z = evaluation.read_named_field(&value, "z").unwrap().unwrap();
    assert_eq!(evaluation.value_as_long(&z).unwrap(), 42);
    assert!(!evaluation.is_degraded());
}

#[test]
fn test_size_variable_overrides_record_size()
{
    let mut program = Program::new();
    let fixture = dynamic_record(&mut program);
    program.variable("pkg__rec___XVZ", 0x6000, 20);
    let mut evaluation = program.evaluation(EngineConfig::default());

    let contents = Contents::from_bytes(dynamic_bytes());
    let fixed = evaluation.fix_type(fixture.record, &contents, None).unwrap();
    assert_eq!(evaluation.arena().size_of(fixed), 20);
}

#[test]
fn test_dynamic_record_over_the_limit()
{
    let mut program = Program::new();
    let fixture = dynamic_record(&mut program);
    let mut evaluation = program.evaluation(EngineConfig::default().with_max_object_size(8));

    let result = evaluation.fix_value(&Value::from_bytes(fixture.record, dynamic_bytes()));
    assert!(matches!(result, Err(GnatError::SizeLimitExceeded { limit: 8, .. })));
}

#[test]
fn test_typedefs_are_collapsed()
{
    let mut program = Program::new();
    let integer = program.integer;
    let alias = program.add(TypeDescriptor::typedef("pkg__count", integer));
    let mut evaluation = program.evaluation(EngineConfig::default());

    assert_eq!(evaluation.fix_type(alias, &Contents::none(), None).unwrap(), integer);
}

#[test]
fn test_parallel_base_type_is_followed()
{
    let mut program = Program::new();
    let integer = program.integer;
    let real = program.add(TypeDescriptor::record("pkg__real", vec![Field::new("x", integer, 0)], 4));
    let reference = program.add(TypeDescriptor::reference(None, real, 8));
    program.declare(TypeDescriptor::record(
        "pkg__stub___XVS",
        vec![Field::new("pkg__real", reference, 0)],
        8,
    ));
    let stub = program.declare(TypeDescriptor::record("pkg__stub", Vec::new(), 0));
    let mut evaluation = program.evaluation(EngineConfig::default());

    assert_eq!(evaluation.fix_type(stub, &Contents::none(), None).unwrap(), real);
}

struct Descriptors
{
    vector: TypeId,
    bits: TypeId,
}

fn descriptors(program: &mut Program) -> Descriptors
{
    let integer = program.integer;
    let boolean = program.add(TypeDescriptor::boolean("boolean"));
    let positive = program.add(TypeDescriptor::range("positive", integer, 1, i64::from(i32::MAX), 4));
    let bounds = program.add(TypeDescriptor::record(
        "pkg__vec___XUB",
        vec![Field::new("LB0", integer, 0), Field::new("UB0", integer, 32)],
        8,
    ));
    let bounds_pointer = program.add(TypeDescriptor::pointer(None, bounds, 8));

    let data = program.add(TypeDescriptor::array(Some("pkg__vec___XUA".to_string()), integer, positive, 0));
    let data_pointer = program.add(TypeDescriptor::pointer(None, data, 8));
    let vector = program.add(TypeDescriptor::record(
        "pkg__vec",
        vec![Field::new("P_ARRAY", data_pointer, 0), Field::new("P_BOUNDS", bounds_pointer, 64)],
        16,
    ));

    let flags = program.add(TypeDescriptor::array(Some("pkg__bits___XP1".to_string()), boolean, positive, 0));
    let flags_pointer = program.add(TypeDescriptor::pointer(None, flags, 8));
    let bits = program.add(TypeDescriptor::record(
        "pkg__bits",
        vec![Field::new("P_ARRAY", flags_pointer, 0), Field::new("P_BOUNDS", bounds_pointer, 64)],
        16,
    ));

    Descriptors { vector, bits }
}

fn fat_pointer(ty: TypeId, data: i64, bounds: i64) -> Value
{
    let mut bytes = write_integer(data, 8, LITTLE);
    bytes.extend(write_integer(bounds, 8, LITTLE));
    Value::from_bytes(ty, bytes)
}

#[test]
fn test_coerce_descriptor_to_simple_array()
{
    let mut program = Program::new();
    let fixture = descriptors(&mut program);
    program.memory.map(Address::new(0x3000), int_bytes(&[10, 20, 30, 40]));
    program.memory.map(Address::new(0x4000), int_bytes(&[1, 4]));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let array = evaluation
        .coerce_to_simple_array(&fat_pointer(fixture.vector, 0x3000, 0x4000))
        .unwrap();
    assert_eq!(array.address(), Some(Address::new(0x3000)));
    assert_eq!(evaluation.arena().size_of(array.ty()), 16);
    match evaluation.arena().kind(array.ty()) {
        Kind::Array { index, .. } => assert_eq!(evaluation.arena().discrete_bounds(*index), Some((1, 4))),
        other => panic!("expected an array, found {other:?}"),
    }

    let fetched = evaluation.fix_value(&array).unwrap();
    assert_eq!(fetched.bytes(), Some(&int_bytes(&[10, 20, 30, 40])[..]));
}

#[test]
fn test_coerce_packed_descriptor()
{
    let mut program = Program::new();
    let fixture = descriptors(&mut program);
    program.memory.map(Address::new(0x3000), vec![0b0001_0000, 0x00]);
    program.memory.map(Address::new(0x4000), int_bytes(&[1, 12]));
    let mut evaluation = program.evaluation(EngineConfig::default());

    let array = evaluation
        .coerce_to_simple_array(&fat_pointer(fixture.bits, 0x3000, 0x4000))
        .unwrap();
    assert_eq!(evaluation.arena().size_of(array.ty()), 2);
    assert!(matches!(
        evaluation.arena().kind(array.ty()),
        Kind::Array { element_bits: 1, .. }
    ));

    let fifth = evaluation.packed_element(&array, &[5]).unwrap();
    assert_eq!(evaluation.value_as_long(&fifth).unwrap(), 1);
    let sixth = evaluation.packed_element(&array, &[6]).unwrap();
    assert_eq!(evaluation.value_as_long(&sixth).unwrap(), 0);
}

#[test]
fn test_coerce_null_descriptor_fails()
{
    let mut program = Program::new();
    let fixture = descriptors(&mut program);
    let mut evaluation = program.evaluation(EngineConfig::default());

    assert_eq!(
        evaluation.coerce_to_simple_array(&fat_pointer(fixture.vector, 0, 0)),
        Err(GnatError::NullArrayAccess("pkg__vec".to_string()))
    );
}

#[test]
fn test_coerce_leaves_plain_values_alone()
{
    let mut program = Program::new();
    let integer = program.integer;
    let mut evaluation = program.evaluation(EngineConfig::default());

    let value = Value::from_bytes(integer, int_bytes(&[3]));
    let coerced = evaluation.coerce_to_simple_array(&value).unwrap();
    assert_eq!(coerced.ty(), integer);
}

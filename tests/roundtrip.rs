use anyhow::Result;
use camino::Utf8PathBuf;
use std::cmp::Ordering;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use xmlobject::{
    Error, FieldDescriptor, Instance, PCDATA, TypeBuilder, TypeDescriptor, Value, XmlOptions,
    entries, registry,
};

struct Catalog {
    catalog: Arc<TypeDescriptor>,
    book: Arc<TypeDescriptor>,
    author: Arc<TypeDescriptor>,
}

fn catalog_types(reg: &str) -> Result<Catalog> {
    let catalog = TypeBuilder::new("Catalog")
        .registry(reg)
        .entity("&xml;", "eXtensible Markup Language")
        .field("name", FieldDescriptor::string_attribute())
        .field("books", FieldDescriptor::list("Book"))
        .build()?;
    let book = TypeBuilder::new("Book")
        .registry(reg)
        .element_order(["title", "author"])
        .field("isbn", FieldDescriptor::string_attribute())
        .field("pages", FieldDescriptor::integer_attribute().optional(true))
        .field("author", FieldDescriptor::item("Author").optional(true))
        .field("title", FieldDescriptor::text())
        .field("notes", FieldDescriptor::comment())
        .field("excerpt", FieldDescriptor::raw().optional(true))
        .build()?;
    let author = TypeBuilder::new("Author")
        .registry(reg)
        .field("name", FieldDescriptor::text().main())
        .build()?;
    Ok(Catalog {
        catalog,
        book,
        author,
    })
}

fn sample(t: &Catalog) -> Result<Instance> {
    let first = Instance::with_fields(
        &t.book,
        [
            ("isbn", "0-441-17271-7".into()),
            ("pages", 412.into()),
            ("title", "Dune".into()),
            ("author", Instance::with_value(&t.author, "Frank Herbert")?.into()),
            ("notes", "first printing".into()),
            ("excerpt", "<spice> & \"sand\"".into()),
        ],
    )?;
    let second = Instance::with_fields(
        &t.book,
        [("isbn", "x".into()), ("title", "Tom & \"Jerry\" <3".into())],
    )?;
    Ok(Instance::with_fields(
        &t.catalog,
        [
            ("name", "About &xml;".into()),
            ("books", entries([first, second])),
        ],
    )?)
}

#[test]
fn round_trip_pretty_with_headers() -> Result<()> {
    let t = catalog_types("roundtrip-pretty")?;
    let c = sample(&t)?;
    let xml = c.to_xml(&XmlOptions::default())?;
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<Catalog"));
    let back = Instance::from_xml(&t.catalog, &xml)?;
    assert_eq!(back, c);
    assert_eq!(back.to_xml(&XmlOptions::default())?, xml);
    Ok(())
}

#[test]
fn round_trip_canonical() -> Result<()> {
    let t = catalog_types("roundtrip-canonical")?;
    let c = sample(&t)?;
    let xml = c.canonical_xml()?;
    assert_eq!(
        xml,
        concat!(
            r#"<Catalog name="About eXtensible Markup Language">"#,
            r#"<Book isbn="0-441-17271-7" pages="412"><title>Dune</title><Author>Frank Herbert</Author>"#,
            r#"<!-- first printing --><![CDATA[<spice> & "sand"]]></Book>"#,
            r#"<Book isbn="x"><title>Tom &amp; &quot;Jerry&quot; &lt;3</title></Book>"#,
            "</Catalog>"
        )
    );
    let back = Instance::from_xml(&t.catalog, &xml)?;
    assert_eq!(back.canonical_xml()?, xml);
    let books = back.items("books");
    assert_eq!(books.len(), 2);
    let dune = books[0].as_object().expect("book");
    assert_eq!(dune.get_integer("pages"), Some(412));
    assert_eq!(dune.get_text("notes"), Some("first printing"));
    assert_eq!(dune.get_text("excerpt"), Some("<spice> & \"sand\""));
    assert_eq!(
        dune.get_object("author").and_then(|a| a.get_text("name")),
        Some("Frank Herbert")
    );
    Ok(())
}

#[test]
fn pretty_output_is_idempotent() -> Result<()> {
    let t = catalog_types("roundtrip-idempotent")?;
    let xml = sample(&t)?.to_xml(&XmlOptions::default())?;
    assert_eq!(xmlobject::pretty_print(&xml, "  ")?, xml);
    Ok(())
}

#[test]
fn missing_required_field_on_load() -> Result<()> {
    let t = catalog_types("roundtrip-required")?;
    let err = Instance::from_xml(&t.book, r#"<Book isbn="1"/>"#).unwrap_err();
    assert_eq!(
        err,
        Error::RequiredNodeMissing {
            field: "title".into(),
            markup: Some(r#"<Book isbn="1"/>"#.into()),
        }
    );
    let err = Instance::from_xml(&t.book, "<Book><title>T</title></Book>").unwrap_err();
    assert!(matches!(err, Error::RequiredNodeMissing { ref field, .. } if field == "isbn"));
    Ok(())
}

#[test]
fn bad_integer_on_load() -> Result<()> {
    let t = catalog_types("roundtrip-integer")?;
    let err = Instance::from_xml(
        &t.book,
        r#"<Book isbn="1" pages="many"><title>T</title></Book>"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == "pages"));
    Ok(())
}

#[test]
fn malformed_document_is_parse_failure() -> Result<()> {
    let t = catalog_types("roundtrip-malformed")?;
    let err = Instance::from_xml(&t.book, "<Book><title>T</Book>").unwrap_err();
    assert!(matches!(err, Error::ParseFailure(_)));
    Ok(())
}

#[test]
fn instance_from_xml_picks_type_by_root() -> Result<()> {
    let reg = "roundtrip-resolve";
    let t = catalog_types(reg)?;
    let author = Instance::with_value(&t.author, "Ursula")?;
    let found = registry(reg).instance_from_xml(&author.canonical_xml()?)?;
    assert_eq!(found.type_name(), "Author");
    assert_eq!(found, author);

    let err = registry(reg).instance_from_xml("<Magazine/>").unwrap_err();
    assert!(matches!(err, Error::ParseFailure(_)));
    Ok(())
}

#[test]
fn from_xml_file() -> Result<()> {
    let t = catalog_types("roundtrip-file")?;
    let c = sample(&t)?;
    let mut file = NamedTempFile::new()?;
    file.write_all(c.to_xml(&XmlOptions::default())?.as_bytes())?;
    let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).expect("utf-8 temp path");
    let back = Instance::from_xml_file(&t.catalog, &path)?;
    assert_eq!(back, c);

    let missing = path.with_file_name("does-not-exist.xml");
    assert!(matches!(
        Instance::from_xml_file(&t.catalog, &missing),
        Err(Error::ParseFailure(_))
    ));
    Ok(())
}

#[test]
fn processing_instruction_headers() -> Result<()> {
    let ty = TypeBuilder::new("Page")
        .registry("roundtrip-pi")
        .encoding("iso-8859-1")
        .field(
            "style",
            FieldDescriptor::processing_instruction(
                "xml-stylesheet",
                [("type", "text/xsl"), ("href", "page.xsl")],
            ),
        )
        .field("body", FieldDescriptor::text().main())
        .build()?;
    let p = Instance::with_value(&ty, "hello")?;
    let opts = XmlOptions {
        pretty: false,
        ..XmlOptions::default()
    };
    assert_eq!(
        p.to_xml(&opts)?,
        concat!(
            r#"<?xml version="1.0" encoding="iso-8859-1"?>"#,
            r#"<?xml-stylesheet type="text/xsl" href="page.xsl"?>"#,
            "<Page>hello</Page>"
        )
    );
    assert_eq!(p.canonical_xml()?, "<Page>hello</Page>");
    assert_eq!(Instance::from_xml(&ty, &p.to_xml(&opts)?)?, p);
    Ok(())
}

#[test]
fn non_stripping_type_is_never_indented() -> Result<()> {
    let ty = TypeBuilder::new("Verbatim")
        .registry("roundtrip-nostrip")
        .strip_strings(false)
        .field("line", FieldDescriptor::text())
        .build()?;
    let v = Instance::with_fields(&ty, [("line", "  padded  ".into())])?;
    let xml = v.to_xml(&XmlOptions::default())?;
    assert_eq!(
        xml,
        r#"<?xml version="1.0" encoding="utf-8"?><Verbatim><line>  padded  </line></Verbatim>"#
    );
    let back = Instance::from_xml(&ty, &xml)?;
    assert_eq!(back.get_text("line"), Some("  padded  "));
    Ok(())
}

#[test]
fn mixed_content_round_trip() -> Result<()> {
    let reg = "roundtrip-mixed";
    let bbb = TypeBuilder::new("BBB")
        .registry(reg)
        .field(
            "content",
            FieldDescriptor::choice([PCDATA, "CCC"])
                .optional(true)
                .repeatable(true)
                .main(),
        )
        .build()?;
    let ccc = TypeBuilder::new("CCC")
        .registry(reg)
        .field("content", FieldDescriptor::text().main())
        .build()?;
    let mut b = Instance::new(&bbb)?;
    b.append("This is")?;
    b.append(Instance::with_value(&ccc, "")?)?;
    b.append("a combination")?;
    b.append(Instance::with_value(&ccc, "CCC elements")?)?;

    let xml = b.to_xml(&XmlOptions::default())?;
    assert_eq!(
        xml,
        [
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            "<BBB>",
            "  This is",
            "  <CCC/>",
            "  a combination",
            "  <CCC>",
            "    CCC elements",
            "  </CCC>",
            "</BBB>",
        ]
        .join("\n")
    );
    let back = Instance::from_xml(&bbb, &xml)?;
    assert_eq!(back.canonical_xml()?, b.canonical_xml()?);
    assert_eq!(back.items("content").len(), 4);
    Ok(())
}

#[test]
fn equality_and_ordering_use_canonical_form() -> Result<()> {
    let t = catalog_types("roundtrip-order")?;
    let a = Instance::with_value(&t.author, "Asimov")?;
    let b = Instance::with_value(&t.author, "Bradbury")?;
    assert!(a < b);
    assert_ne!(a, b);
    assert_eq!(a.clone(), a);
    Ok(())
}

#[test]
fn display_prints_pretty_body() -> Result<()> {
    let t = catalog_types("roundtrip-display")?;
    let a = Instance::with_value(&t.author, "Le Guin")?;
    assert_eq!(a.to_string(), "<Author>\n  Le Guin\n</Author>");
    Ok(())
}

#[test]
fn raw_and_comment_keep_whitespace_without_stripping() -> Result<()> {
    let ty = TypeBuilder::new("Snippet")
        .registry("roundtrip-verbatim-leaves")
        .strip_strings(false)
        .field("code", FieldDescriptor::raw().optional(true))
        .field("remark", FieldDescriptor::comment())
        .build()?;
    let s = Instance::with_fields(
        &ty,
        [("code", "  indented\n".into()), ("remark", " padded ".into())],
    )?;
    let xml = s.canonical_xml()?;
    assert_eq!(
        xml,
        "<Snippet><![CDATA[  indented\n]]><!--  padded  --></Snippet>"
    );
    let back = Instance::from_xml(&ty, &xml)?;
    assert_eq!(back.get_text("code"), Some("  indented\n"));
    assert_eq!(back.get_text("remark"), Some(" padded "));
    assert_eq!(back.canonical_xml()?, xml);

    let again = Instance::from_xml(&ty, &back.to_xml(&XmlOptions::default())?)?;
    assert_eq!(again, s);
    Ok(())
}

#[test]
fn comment_text_is_written_unescaped() -> Result<()> {
    let ty = TypeBuilder::new("Remark")
        .registry("roundtrip-comment")
        .field("note", FieldDescriptor::comment())
        .build()?;
    let mut r = Instance::with_fields(&ty, [("note", "it's a < b & \"c\"".into())])?;
    assert_eq!(
        r.canonical_xml()?,
        r#"<Remark><!-- it's a < b & "c" --></Remark>"#
    );
    let back = Instance::from_xml(&ty, &r.to_xml(&XmlOptions::default())?)?;
    assert_eq!(back.get_text("note"), Some("it's a < b & \"c\""));
    assert_eq!(back, r);

    assert!(matches!(
        r.set("note", "a -- b"),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(r.get_text("note"), Some("it's a < b & \"c\""));
    Ok(())
}

#[test]
fn non_ascii_names_survive_pretty_output() -> Result<()> {
    let ty = TypeBuilder::new("Büch")
        .registry("roundtrip-unicode")
        .field("größe", FieldDescriptor::integer_attribute())
        .field("titel", FieldDescriptor::text())
        .build()?;
    let b = Instance::with_fields(&ty, [("größe", 2.into()), ("titel", "Faust".into())])?;
    let xml = b.to_xml(&XmlOptions::default())?;
    assert_eq!(
        xml,
        [
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<Büch größe="2">"#,
            "  <titel>",
            "    Faust",
            "  </titel>",
            "</Büch>",
        ]
        .join("\n")
    );
    assert_eq!(Instance::from_xml(&ty, &xml)?, b);
    Ok(())
}

#[test]
fn nested_fields_bind_only_under_their_owner() -> Result<()> {
    let reg = "roundtrip-parent";
    let shelf = TypeBuilder::new("Shelf")
        .registry(reg)
        .field("label", FieldDescriptor::item("Label").optional(true))
        .field("boxes", FieldDescriptor::list("Box"))
        .build()?;
    TypeBuilder::new("Box")
        .registry(reg)
        .field("label", FieldDescriptor::item("Label").optional(true))
        .build()?;
    let parcel = TypeBuilder::new("Parcel")
        .registry(reg)
        .field("label", FieldDescriptor::item("Label"))
        .build()?;
    TypeBuilder::new("Label")
        .registry(reg)
        .field("text", FieldDescriptor::text().main())
        .build()?;

    // The Label inside the Box belongs to the Box, not to the Shelf.
    let s = Instance::from_xml(&shelf, "<Shelf><Box><Label>inner</Label></Box></Shelf>")?;
    assert!(s.get("label").is_some_and(Value::is_null));
    let boxes = s.items("boxes");
    assert_eq!(boxes.len(), 1);
    assert_eq!(
        boxes[0]
            .as_object()
            .and_then(|b| b.get_object("label"))
            .and_then(|l| l.get_text("text")),
        Some("inner")
    );

    // Under a root that is not a Shelf element nothing binds.
    let stray = Instance::from_xml(&shelf, "<Crate><Label>top</Label><Box/></Crate>")?;
    assert!(stray.get("label").is_some_and(Value::is_null));
    assert!(stray.items("boxes").is_empty());

    let err = Instance::from_xml(&parcel, "<Crate><Label>top</Label></Crate>").unwrap_err();
    assert!(matches!(err, Error::RequiredNodeMissing { ref field, .. } if field == "label"));
    let p = Instance::from_xml(&parcel, "<Parcel><Label>top</Label></Parcel>")?;
    assert_eq!(
        p.get_object("label").and_then(|l| l.get_text("text")),
        Some("top")
    );
    Ok(())
}

#[test]
fn mixed_text_edges_are_trimmed_only_when_stripping() -> Result<()> {
    let reg = "roundtrip-mixed-edges";
    let bold = TypeBuilder::new("B")
        .registry(reg)
        .field("text", FieldDescriptor::text().main())
        .build()?;
    let stripped = TypeBuilder::new("P")
        .registry(reg)
        .field(
            "content",
            FieldDescriptor::choice([PCDATA, "B"]).optional(true).repeatable(true).main(),
        )
        .build()?;
    let verbatim = TypeBuilder::new("Q")
        .registry(reg)
        .strip_strings(false)
        .field(
            "content",
            FieldDescriptor::choice([PCDATA, "B"]).optional(true).repeatable(true).main(),
        )
        .build()?;

    let mut p = Instance::new(&stripped)?;
    p.append("hello ")?;
    p.append(Instance::with_value(&bold, "w")?)?;
    p.append(" world")?;
    let back = Instance::from_xml(&stripped, &p.canonical_xml()?)?;
    assert_eq!(back.canonical_xml()?, "<P>hello<B>w</B>world</P>");

    let mut q = Instance::new(&verbatim)?;
    q.append("hello ")?;
    q.append(Instance::with_value(&bold, "w")?)?;
    q.append(" world")?;
    let back = Instance::from_xml(&verbatim, &q.canonical_xml()?)?;
    assert_eq!(back.canonical_xml()?, "<Q>hello <B>w</B> world</Q>");
    assert_eq!(back, q);
    Ok(())
}

#[test]
fn unserializable_instances_still_equal_themselves() -> Result<()> {
    let reg = "roundtrip-unserializable";
    let sack = TypeBuilder::new("Sack")
        .registry(reg)
        .field("items", FieldDescriptor::list("Pebble").optional(false))
        .build()?;
    let pebble = TypeBuilder::new("Pebble").registry(reg).build()?;

    let empty = Instance::new(&sack)?;
    assert!(empty.canonical_xml().is_err());
    assert_eq!(empty, empty.clone());
    assert_eq!(empty.partial_cmp(&empty), Some(Ordering::Equal));

    let mut full = Instance::new(&sack)?;
    full.list_mut("items")?.push(Instance::new(&pebble)?)?;
    assert_ne!(empty, full);
    assert_eq!(empty.partial_cmp(&full), None);
    Ok(())
}

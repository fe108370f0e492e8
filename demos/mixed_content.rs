//! Mixed content: text interleaved with elements, and a List accepting
//! instances that only fit inside its item type.
//!
//! Run with `cargo run --example mixed_content`.

use anyhow::{Result, ensure};
use xmlobject::{FieldDescriptor, Instance, PCDATA, TypeBuilder, XmlOptions};

const REGISTRY: &str = "mixed-demo";

fn main() -> Result<()> {
    let xxx = TypeBuilder::new("XXX")
        .registry(REGISTRY)
        .field("aaa", FieldDescriptor::list("AAA").optional(false))
        .field("bbb", FieldDescriptor::list("BBB").optional(false))
        .build()?;
    TypeBuilder::new("AAA")
        .registry(REGISTRY)
        .field("content", FieldDescriptor::choice(["BBB", "CCC"]).main())
        .build()?;
    let bbb = TypeBuilder::new("BBB")
        .registry(REGISTRY)
        .field(
            "content",
            FieldDescriptor::choice([PCDATA, "CCC"])
                .optional(true)
                .repeatable(true)
                .main(),
        )
        .build()?;
    let ccc = TypeBuilder::new("CCC")
        .registry(REGISTRY)
        .field("content", FieldDescriptor::text().main())
        .build()?;

    let mut doc = Instance::new(&xxx)?;
    match doc.to_xml(&XmlOptions::default()) {
        Err(e) => println!("empty document rejected: {}", e),
        Ok(_) => anyhow::bail!("an empty XXX should not serialize"),
    }

    // A CCC is not an AAA, but an AAA may hold one, so the list wraps it.
    doc.list_mut("aaa")?
        .push(Instance::with_value(&ccc, "Precisely one element.")?)?;

    let mut three = Instance::new(&bbb)?;
    for _ in 0..3 {
        three.append(Instance::with_value(&ccc, "")?)?;
    }
    doc.list_mut("aaa")?.push(three)?;
    doc.list_mut("bbb")?.push(Instance::new(&bbb)?)?;

    let mut mixed = Instance::new(&bbb)?;
    mixed.append("This is")?;
    mixed.append(Instance::with_value(&ccc, "")?)?;
    mixed.append("a combination")?;
    mixed.append(Instance::with_value(&ccc, "")?)?;
    mixed.append("of")?;
    mixed.append(Instance::with_value(&ccc, "CCC elements")?)?;
    mixed.append("and text")?;
    mixed.append(Instance::with_value(&ccc, "")?)?;
    doc.list_mut("bbb")?.push(mixed)?;

    let mut text_only = Instance::new(&bbb)?;
    text_only.append("Text only.")?;
    doc.list_mut("bbb")?.push(text_only)?;

    let xml = doc.to_xml(&XmlOptions::default())?;
    println!("{}", xml);

    let reloaded = Instance::from_xml(&xxx, &xml)?;
    ensure!(reloaded == doc, "document changed during export/import");

    let mut depth_report = Vec::new();
    reloaded.for_each(|field, owner, depth| {
        depth_report.push(format!("{}{}.{}", "  ".repeat(depth), owner.type_name(), field.name()));
    });
    println!("{}", depth_report.join("\n"));
    Ok(())
}

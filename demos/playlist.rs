//! Declare two related types, build a playlist, print it and load it back.
//!
//! Run with `cargo run --example playlist`.

use anyhow::{Context, Result, ensure};
use xmlobject::{FieldDescriptor, Instance, TypeBuilder, XmlOptions, entries, registry};

fn main() -> Result<()> {
    let song = TypeBuilder::new("Song")
        .registry("playlist-demo")
        .element_order(["title", "comment"])
        .attribute_order(["artist", "file", "length"])
        .field("file", FieldDescriptor::string_attribute())
        .field("length", FieldDescriptor::integer_attribute())
        .field("artist", FieldDescriptor::string_attribute().optional(true))
        .field("title", FieldDescriptor::text().default_value("Track Name"))
        .field("comment", FieldDescriptor::comment().default_value("Blah blah"))
        .build()?;

    let playlist = TypeBuilder::new("Playlist")
        .registry("playlist-demo")
        .entity("&xml;", "eXtensible Markup Language")
        .field("name", FieldDescriptor::string_attribute())
        .field("songs", FieldDescriptor::list("Song"))
        .build()?;

    let first = Instance::with_fields(
        &song,
        [
            ("file", "foobar.ogg".into()),
            ("length", 300.into()),
            ("artist", "foo".into()),
            ("title", "Bar".into()),
        ],
    )?;
    let mut list = Instance::with_fields(&playlist, [("songs", entries([first]))])?;
    list.set("name", "My Favorites in &xml;")?;

    let mut second = Instance::with_fields(
        &song,
        [
            ("file", "opensource.ogg".into()),
            ("comment", "hey man it rocks".into()),
        ],
    )?;
    second.set("length", 250)?;
    list.list_mut("songs")?.push(second)?;

    let xml = list.to_xml(&XmlOptions::default())?;
    println!("{}", xml);

    let loaded = Instance::from_xml(&playlist, &xml).context("reloading playlist")?;
    ensure!(loaded == list, "playlist changed during export/import");

    let resolved = registry("playlist-demo")
        .instance_from_xml(&xml)
        .context("resolving root element")?;
    ensure!(resolved.type_name() == "Playlist");

    println!("{}", serde_json::to_string_pretty(&loaded.to_dict())?);
    Ok(())
}

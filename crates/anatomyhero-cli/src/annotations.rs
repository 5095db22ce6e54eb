//! `annotations` subcommand: the viewer's annotation store backed by a JSON file

use std::path::Path;

use anatomyhero_core::{
    AnnotationDraft, AnnotationPersistence, AnnotationStore, JsonFilePersistence,
};
use anyhow::{bail, Context, Result};
use bevy_math::Vec3;
use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum AnnotationCommand {
    /// Print every annotation in creation order
    List,
    /// Add an annotation at a world-space point
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, allow_negative_numbers = true)]
        x: f32,
        #[arg(long, allow_negative_numbers = true)]
        y: f32,
        #[arg(long, allow_negative_numbers = true)]
        z: f32,
    },
    /// Delete an annotation by id
    Delete { id: String },
}

pub fn run(path: &Path, command: AnnotationCommand) -> Result<()> {
    let persistence = JsonFilePersistence::new(path);
    // The store treats unreadable data as empty; refuse to overwrite it here
    persistence
        .load_all()
        .with_context(|| format!("Failed to read annotation store {}", path.display()))?;
    let mut store = AnnotationStore::open(Box::new(persistence));

    match command {
        AnnotationCommand::List => {
            if store.is_empty() {
                println!("No annotations in {}", path.display());
            }
            for a in store.iter() {
                let p = a.world_position;
                println!("{}  {}  ({:.3}, {:.3}, {:.3})", a.id, a.title, p.x, p.y, p.z);
                println!("    {}", a.description);
            }
        }
        AnnotationCommand::Add {
            title,
            description,
            x,
            y,
            z,
        } => {
            let draft = AnnotationDraft::new(title, description, Vec3::new(x, y, z));
            if !draft.is_complete() {
                bail!("Title and description must not be empty");
            }
            let Some(annotation) = store.add(&draft) else {
                bail!("Annotation was not added");
            };
            println!("Added {}", annotation.id);
        }
        AnnotationCommand::Delete { id } => {
            if store.delete(&id).is_none() {
                bail!("No annotation with id {id}");
            }
            println!("Deleted {id}");
        }
    }
    Ok(())
}

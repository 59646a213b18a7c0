use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use blorbkit::archive::{export_chunk, list_chunks, load_path, load_path_with, save_path, LoadOptions};
use blorbkit::chunk::{guess_chunk_type, is_singleton_type, ChunkContent, ChunkType, ResourceId, Usage};
use blorbkit::{apply_edit, Blorb, Chunk, ChunkKey, Edit};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blorb", about = "Inspect and edit Blorb resource files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a blorb holding only an empty resource index
    New {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List chunks
    List {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show game identification and resource totals
    Info {
        input: PathBuf,
    },
    /// Print diagnostics; exits with status 1 if there are any
    Check {
        input: PathBuf,
        #[arg(long)]
        json: bool,
        /// Also compare chunk offsets with the canonical layout
        #[arg(long)]
        layout: bool,
    },
    /// Write chunks out as standalone files
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Index of a single chunk (default: all)
        #[arg(long)]
        chunk: Option<usize>,
    },
    /// Add a file as a new chunk
    Add {
        input: PathBuf,
        file:  PathBuf,
        /// Chunk tag, e.g. PNG or TEXT (default: guessed from the file)
        #[arg(short = 't', long = "type")]
        chunk_type: Option<ChunkType>,
        /// Index the new chunk as e.g. Pict:3
        #[arg(short, long)]
        resource: Option<ResourceId>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete a chunk and every reference to its resource
    Delete {
        input: PathBuf,
        #[arg(long)]
        chunk: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Index a chunk as a resource, or remove it from the index
    SetUsage {
        input: PathBuf,
        #[arg(long)]
        chunk: usize,
        /// e.g. Pict:3; omit to clear
        #[arg(short, long)]
        resource: Option<ResourceId>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Make a picture the frontispiece
    Frontispiece {
        input: PathBuf,
        #[arg(long)]
        chunk: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Set or remove a resource's description
    Describe {
        input: PathBuf,
        #[arg(short, long)]
        resource: ResourceId,
        /// Omit to remove the description
        #[arg(long, default_value = "")]
        text: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Remove a picture's entry from the resolution table
    DeleteReso {
        input: PathBuf,
        #[arg(long)]
        number: u32,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    env_logger::init();

    match Cli::parse().command {

        // ── New ──────────────────────────────────────────────────────────────
        Commands::New { output } => {
            let name = output.file_name().map(|n| n.to_string_lossy().into_owned());
            save_path(&Blorb::new(name), &output)?;
            println!("Created: {}", output.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let doc = load_path(&input)?;
            let rows = list_chunks(&doc);
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(ExitCode::SUCCESS);
            }
            println!("Blorb: {}", input.display());
            println!("{:>4} {:>10} {:<10} {:>10} {:<8} {:<12}  Description",
                     "Idx", "Offset", "Type", "Size", "Resource", "BLAKE3");
            for r in rows {
                let resource = r.resource.map(|res| res.to_string()).unwrap_or_else(|| "-".into());
                println!("{:>4} {:>10} {:<10} {:>10} {:<8} {:<12}  {}",
                    r.index, r.file_pos, r.chunk_type, r.length, resource, &r.digest[..12], r.description);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let doc = load_path(&input)?;
            print_info(&input, &doc);
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { input, json, layout } => {
            let doc = load_path_with(&input, &LoadOptions { check_layout: layout })?;
            if json {
                println!("{}", serde_json::to_string_pretty(doc.errors())?);
            } else if doc.errors().is_empty() {
                println!("{}: no problems found", input.display());
            } else {
                println!("{}: {} problem(s)", input.display(), doc.errors().len());
                print_diagnostics(&doc);
            }
            if !doc.errors().is_empty() {
                return Ok(ExitCode::from(1));
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir, chunk } => {
            let doc = load_path(&input)?;
            let selected: Vec<_> = match chunk {
                Some(i) => vec![nth_chunk(&doc, i)?.clone()],
                None => doc.chunks().to_vec(),
            };
            std::fs::create_dir_all(&output_dir)?;
            let mut used = HashSet::new();
            for c in selected {
                let out = export_chunk(&c, &doc);
                let name = if used.insert(out.filename.clone()) {
                    out.filename
                } else {
                    format!("{}-{}", c.index(), out.filename)
                };
                std::fs::write(output_dir.join(&name), &out.bytes)?;
                println!("  wrote  {}  ({}, {} bytes)", name, out.mime_type, out.bytes.len());
            }
        }

        // ── Add ──────────────────────────────────────────────────────────────
        Commands::Add { input, file, chunk_type, resource, output } => {
            let doc = load_path(&input)?;
            let data = std::fs::read(&file)?;
            let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let chunk_type = match chunk_type {
                Some(t) => t,
                None => guess_chunk_type(&file_name, &data)
                    .ok_or_else(|| format!("cannot tell what kind of chunk {file_name} is; pass --type"))?,
            };
            let mut doc = apply_edit(&doc, Edit::AddChunk { chunk_type, data });
            let added = if is_singleton_type(chunk_type) {
                doc.first_chunk_of_type(chunk_type)
            } else {
                doc.chunks().last()
            };
            let added = added.map(|c| c.key());
            if let (Some(resource), Some(key)) = (resource, added) {
                doc = apply_edit(&doc, Edit::SetChunkUsage { key, resource: Some(resource) });
            }
            finish(&doc, &output)?;
        }

        // ── Structural edits ─────────────────────────────────────────────────
        Commands::Delete { input, chunk, output } => {
            let doc = load_path(&input)?;
            let key = chunk_key(&doc, chunk)?;
            finish(&apply_edit(&doc, Edit::DeleteChunk(key)), &output)?;
        }
        Commands::SetUsage { input, chunk, resource, output } => {
            let doc = load_path(&input)?;
            let key = chunk_key(&doc, chunk)?;
            finish(&apply_edit(&doc, Edit::SetChunkUsage { key, resource }), &output)?;
        }
        Commands::Frontispiece { input, chunk, output } => {
            let doc = load_path(&input)?;
            let key = chunk_key(&doc, chunk)?;
            finish(&apply_edit(&doc, Edit::SetFrontispiece(key)), &output)?;
        }
        Commands::Describe { input, resource, text, output } => {
            let doc = load_path(&input)?;
            finish(&apply_edit(&doc, Edit::SetResourceDescription { resource, text }), &output)?;
        }
        Commands::DeleteReso { input, number, output } => {
            let doc = load_path(&input)?;
            finish(&apply_edit(&doc, Edit::DeleteResolutionEntry(number)), &output)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn nth_chunk(doc: &Blorb, index: usize) -> Result<&Arc<Chunk>, Box<dyn Error>> {
    doc.chunks()
        .get(index)
        .ok_or_else(|| format!("no chunk {index}; the file has {}", doc.len()).into())
}

fn chunk_key(doc: &Blorb, index: usize) -> Result<ChunkKey, Box<dyn Error>> {
    Ok(nth_chunk(doc, index)?.key())
}

fn finish(doc: &Blorb, output: &Path) -> Result<(), Box<dyn Error>> {
    print_diagnostics(doc);
    save_path(doc, output)?;
    println!("Wrote: {}", output.display());
    Ok(())
}

fn print_diagnostics(doc: &Blorb) {
    for d in doc.errors() {
        match d.chunk.and_then(|k| doc.chunk_for_key(k)) {
            Some(c) => eprintln!("  [{:>3} {}] {}", c.index(), c.type_label(), d.text),
            None => eprintln!("  {}", d.text),
        }
    }
}

fn print_info(input: &Path, doc: &Blorb) {
    println!("── Blorb ────────────────────────────────────────────────");
    println!("  Path           {}", input.display());
    println!("  Length         {} B", doc.total_length());
    println!("  Chunks         {}", doc.len());

    for c in doc.chunks() {
        match c.content() {
            ChunkContent::ZCode(z) => {
                println!("  Game           Z-code v{}, release {}, serial {}", z.version, z.release, z.serial);
            }
            ChunkContent::Glulx(g) => match &g.info {
                Some(i) => println!(
                    "  Game           Glulx {}, release {}, serial {} (Inform {})",
                    g.vm_version, i.release, i.serial, i.compiler_version
                ),
                None => println!("  Game           Glulx {}", g.vm_version),
            },
            ChunkContent::ReleaseNumber(r) => println!("  Release        {}", r.release),
            ChunkContent::Frontispiece(f) => println!("  Frontispiece   Pict:{}", f.picture),
            ChunkContent::Metadata(_) => println!("  Metadata       {} B of iFiction", c.data().len()),
            _ => {}
        }
    }

    if let Some(idx) = doc.resource_index() {
        println!("  Resources      {}", idx.len());
        for usage in Usage::ALL {
            let n = idx.entries().iter().filter(|e| e.resource.usage == usage).count();
            if n > 0 {
                println!("    {:<12} {}", usage.short_name(), n);
            }
        }
    }
    println!("  Diagnostics    {}", doc.errors().len());
}

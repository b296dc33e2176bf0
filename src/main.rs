use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use whats_in_the_box::photos;
use whats_in_the_box::router::Route;
use whats_in_the_box::state::{BoxFilter, BoxSort, BoxStore, BoxUpdate, RecognitionSource, StorageBox};
use whats_in_the_box::{App, AppConfig, Message, Screen};

#[derive(Parser, Debug)]
#[command(name = "witb", version, about = "What's in the box? Catalog storage boxes and their contents")]
struct Cli {
    /// Use this directory for the catalog and photos instead of the configured one
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a box
    Add {
        name: String,
        #[arg(long, default_value = "")]
        location: String,
        /// Photo to attach (any format the image decoder knows)
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// List boxes
    List {
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
        #[arg(long, value_enum, conflicts_with = "search")]
        filter: Option<FilterArg>,
        /// Only boxes whose name contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a box and its items
    Show { id: String },
    /// Change a box
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Delete a box and everything in it
    Delete { id: String },
    /// Add an item to a box
    ItemAdd {
        box_id: String,
        name: String,
        /// Mark the item as found by image recognition
        #[arg(long)]
        ai: bool,
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
    },
    /// Remove an item from a box
    ItemRemove { box_id: String, item_id: String },
    /// Write the QR code that links to a box
    Qr {
        box_id: String,
        /// Output file. Defaults to the downloads directory.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Side of the image in pixels
        #[arg(long)]
        size: Option<u32>,
        /// Image to place in the center of the code
        #[arg(long)]
        logo: Option<PathBuf>,
    },
    /// Follow a deep link such as whatsinthebox://box/<id>
    Open { url: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Name,
    Recent,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    Photos,
    Empty,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("⚠️  {}. Using defaults.", e);
        AppConfig::default()
    });
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }
    if let Command::Qr { size: Some(size), .. } = &cli.command {
        config.qr_size = *size;
    }

    // The app cannot function without its catalog
    let mut app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ Failed to open the catalog: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if run(&mut app, cli.command).await {
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", app.status());
        ExitCode::FAILURE
    }
}

async fn run(app: &mut App, command: Command) -> bool {
    match command {
        Command::Add {
            name,
            location,
            photo,
        } => {
            if let Some(path) = photo {
                if !attach_photo(app, &path).await {
                    return false;
                }
            }
            app.update(Message::Navigate(Route::AddBox));
            report(app, Message::SaveBox {
                name,
                location_hint: location,
            })
        }
        Command::List {
            sort,
            filter,
            search,
        } => {
            let result = match (filter, search) {
                (_, Some(text)) => app.library().find_boxes(&BoxFilter::NameContains(text)),
                (Some(FilterArg::Photos), None) => app.library().find_boxes(&BoxFilter::WithPhotos),
                (Some(FilterArg::Empty), None) => app.library().find_boxes(&BoxFilter::Empty),
                (None, None) => app.library().list_boxes(match sort {
                    SortArg::Name => BoxSort::Name,
                    SortArg::Recent => BoxSort::RecentlyUpdated,
                }),
            };
            match result {
                Ok(boxes) => {
                    print_boxes(&boxes);
                    true
                }
                Err(e) => {
                    eprintln!("{}", e);
                    false
                }
            }
        }
        Command::Show { id } => {
            app.update(Message::Navigate(Route::BoxDetail(id)));
            show_screen(app)
        }
        Command::Edit {
            id,
            name,
            location,
            photo,
        } => {
            if let Some(path) = photo {
                if !attach_photo(app, &path).await {
                    return false;
                }
            }
            app.update(Message::Navigate(Route::EditBox(id.clone())));
            report(app, Message::UpdateBox {
                id,
                changes: BoxUpdate {
                    name,
                    location_hint: location,
                    photo_path: None,
                },
            })
        }
        Command::Delete { id } => report(app, Message::DeleteBox(id)),
        Command::ItemAdd {
            box_id,
            name,
            ai,
            confidence,
        } => report(app, Message::AddItem {
            box_id,
            name,
            recognized_by: if ai {
                RecognitionSource::Ai
            } else {
                RecognitionSource::Manual
            },
            confidence,
        }),
        Command::ItemRemove { box_id, item_id } => {
            report(app, Message::RemoveItem { box_id, item_id })
        }
        Command::Qr {
            box_id, out, logo, ..
        } => {
            let logo = match logo.as_deref().map(photos::load_photo).transpose() {
                Ok(logo) => logo,
                Err(e) => {
                    eprintln!("{}", e);
                    return false;
                }
            };
            match app.export_box_qr(&box_id, logo.as_ref(), out.as_deref()) {
                Ok(path) => {
                    println!("{}", path.display());
                    true
                }
                Err(e) => {
                    eprintln!("{}", e);
                    false
                }
            }
        }
        Command::Open { url } => {
            app.update(Message::Navigate(Route::Home));
            app.update(Message::OpenUrl(url));
            show_screen(app)
        }
    }
}

async fn attach_photo(app: &mut App, path: &Path) -> bool {
    match tokio::fs::read(path).await {
        Ok(bytes) => app.load_photo(bytes).await,
        Err(e) => {
            warn!("⚠️  Could not read {}: {}", path.display(), e);
            eprintln!("Failed to load photo");
            false
        }
    }
}

fn report(app: &mut App, message: Message) -> bool {
    let ok = app.update(message);
    if ok {
        println!("{}", app.status());
    }
    ok
}

fn show_screen(app: &App) -> bool {
    match app.screen() {
        Ok(Screen::Home(boxes)) => print_boxes(&boxes),
        Ok(Screen::BoxDetail(storage_box)) | Ok(Screen::EditBox(storage_box)) => {
            print_box(&storage_box)
        }
        Ok(Screen::NotFound(id)) => println!("Box not found: {}", id),
        Ok(Screen::Settings) => println!("Settings"),
        Ok(Screen::AddBox) => println!("New box"),
        Err(e) => {
            eprintln!("{}", e);
            return false;
        }
    }
    true
}

fn print_boxes(boxes: &[StorageBox]) {
    if boxes.is_empty() {
        println!("No boxes yet.");
        return;
    }
    for storage_box in boxes {
        println!(
            "{}  {:<24} {:>3} items  {}",
            storage_box.id,
            storage_box.name,
            storage_box.item_count(),
            storage_box.location_hint
        );
    }
}

fn print_box(storage_box: &StorageBox) {
    println!("{}", storage_box.name);
    println!("  id:       {}", storage_box.id);
    if !storage_box.location_hint.is_empty() {
        println!("  location: {}", storage_box.location_hint);
    }
    match storage_box.photo() {
        Ok(path) => println!("  photo:    {}", path.display()),
        Err(e) if storage_box.has_photo() => println!("  photo:    {}", e),
        Err(_) => {}
    }
    println!("  updated:  {}", storage_box.updated_at.format("%Y-%m-%d %H:%M"));

    if storage_box.is_empty() {
        println!("  (empty)");
    }
    for item in &storage_box.items {
        println!(
            "  - {} [{}, {:.0}%] {}",
            item.name,
            item.recognized_by.as_str(),
            item.confidence * 100.0,
            item.id
        );
    }
}

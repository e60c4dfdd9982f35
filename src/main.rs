use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use workgrid::config::Settings;
use workgrid::editor::PendingUpload;
use workgrid::models::{ImageDescriptor, SortBy, SortOrder, WorkForm, WorkImageRecord};
use workgrid::render::{render_rows, ViewerDecorator};
use workgrid::service::WorkService;
use workgrid::GridRow;

#[derive(Parser)]
#[command(name = "workgrid", version, about = "Portfolio grid layout and content tool")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory holding uploaded media
    #[arg(long, global = true)]
    media_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lay out a JSON array of image records (file path, or `-` for stdin)
    Layout { input: String },
    /// List works
    Works {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = SortArg::Date)]
        sort: SortArg,
        #[arg(long, value_enum, default_value_t = OrderArg::Desc)]
        order: OrderArg,
    },
    /// Print the rows of a work's gallery
    Gallery { slug: String },
    /// Append an image to an existing work
    AddImage {
        work_id: i64,
        file: PathBuf,
        #[arg(long)]
        full_width: bool,
        #[arg(long, default_value_t = 1)]
        span: u32,
    },
    /// List brands
    Brands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Date,
    Name,
    Category,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Date => SortBy::Date,
            SortArg::Name => SortBy::Name,
            SortArg::Category => SortBy::Category,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Asc => SortOrder::Asc,
            OrderArg::Desc => SortOrder::Desc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("workgrid=info".parse().context("Invalid log directive")?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }
    if let Some(dir) = cli.media_dir {
        settings.media_root = dir;
    }
    debug!(?settings, "Resolved settings");

    match cli.command {
        Command::Layout { input } => {
            let json = read_input(&input)?;
            let records: Vec<WorkImageRecord> =
                serde_json::from_str(&json).context("Expected a JSON array of image records")?;
            let descriptors: Vec<ImageDescriptor> =
                records.iter().map(ImageDescriptor::from_record).collect();
            print_rows(&workgrid::compute_layout(&descriptors));
        }
        Command::Works {
            search,
            sort,
            order,
        } => {
            let service = WorkService::open(&settings)?;
            let works = service.list_works(search, sort.into(), order.into()).await?;
            for work in works {
                println!(
                    "{:>5}  {:<40}  {}",
                    work.id,
                    work.title,
                    work.category.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Gallery { slug } => {
            let service = WorkService::open(&settings)?;
            let Some(gallery) = service.gallery(&slug).await? else {
                bail!("No work with slug {slug:?}");
            };
            println!("{} ({})", gallery.work.title, gallery.work.slug());
            print_rows(&gallery.rows);
        }
        Command::AddImage {
            work_id,
            file,
            full_width,
            span,
        } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read image: {:?}", file))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let service = WorkService::open(&settings)?;
            let (work, mut editor) = service.open_editor(work_id).await?;
            let original = editor.images().to_vec();

            editor.add_uploads([PendingUpload::new(file_name, bytes)]);
            let index = editor.len() - 1;
            if full_width {
                editor.toggle_full_width(index);
            }
            for _ in 1..span {
                editor.increase_row_span(index);
            }

            let form = WorkForm {
                title: work.title.clone(),
                description: work.description.clone(),
                category: work.category.clone(),
            };
            service
                .save_work(work_id, form, None, original, editor)
                .await?;
            println!("Added image to {}", work.title);
        }
        Command::Brands => {
            let service = WorkService::open(&settings)?;
            for brand in service.brands().await? {
                let mark = if brand.selected { "*" } else { " " };
                println!("{mark} {:>3}  {}", brand.order, brand.name);
            }
        }
    }

    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
}

fn print_rows(rows: &[GridRow]) {
    let plan = render_rows(rows, &ViewerDecorator);
    for (row, rendered) in rows.iter().zip(plan.rows.iter()) {
        let cells: Vec<String> = row
            .items
            .iter()
            .zip(rendered.cells.iter())
            .map(|(item, cell)| {
                format!(
                    "{:?} span={} x{:.2} \"{}\"",
                    item.key, cell.column_span, cell.scale, cell.attachment.alt_text
                )
            })
            .collect();
        println!("row {:>3}  {:<16}  {}", row.row_index, rendered.style(), cells.join(" | "));
    }
}

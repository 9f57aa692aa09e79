mod display;
mod import;
mod interactive;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use loterias_db::bets::{load_bets, selections_for_game};
use loterias_db::db::{
    count_draws, db_path, fetch_last_draws, fetch_series, insert_draws, max_contest, migrate, open_db,
};
use loterias_db::models::{Ball, GameGeometry};
use loterias_db::rusqlite::Connection;
use loterias_engine::backtest::backtest_bets;
use loterias_engine::config::{load_config, EngineConfig, DEFAULT_CONFIG_FILE};
use loterias_engine::delay::{delay_table, number_profile};
use loterias_engine::reconcile::reconcile;
use loterias_engine::snapshot::{load_snapshot, save_snapshot, StaticSnapshot};
use loterias_engine::source::HttpDrawSource;
use loterias_engine::stats::{compute_aggregate, Mode};
use loterias_engine::Session;
use crate::display::{
    display_backtest, display_delays, display_draws, display_import_summary, display_profile,
    display_reconciliation, display_stats,
};

#[derive(Parser)]
#[command(name = "loterias", about = "Histórico, estatísticas e simulação das loterias da Caixa")]
struct Cli {
    /// Caminho da base SQLite (padrão: data/loterias.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Arquivo de configuração
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importar concursos de um arquivo CSV
    Import {
        /// Modalidade (megasena, quina, lotofacil, ...)
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Caminho do arquivo CSV
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Mostrar o caminho da base de dados
    DbPath,

    /// Listar os últimos concursos
    List {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Quantidade de concursos
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Conciliar a base com a fonte ao vivo
    Sync {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Snapshot estático usado quando a base está vazia
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Estatísticas dos últimos concursos ou dos seus jogos
    Stats {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Janela de análise (quantidade de concursos)
        #[arg(short, long, default_value = "100")]
        window: u32,

        /// Arquivo de apostas: analisa os seus jogos em vez dos concursos
        #[arg(short, long)]
        bets: Option<PathBuf>,
    },

    /// Perfil de uma dezena
    Profile {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Dezena analisada
        number: String,

        /// Janela de frequência em meses
        #[arg(short, long)]
        months: Option<u32>,
    },

    /// Atraso atual e médio de todas as dezenas
    Delays {
        #[arg(short, long, default_value = "megasena")]
        game: String,
    },

    /// Simular as suas apostas nos concursos recentes
    Backtest {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Arquivo de apostas (JSON)
        #[arg(short, long)]
        bets: PathBuf,

        /// Quantidade de concursos simulados
        #[arg(short, long, default_value = "10")]
        window: u32,

        /// Completar concursos ausentes na janela pela fonte ao vivo
        #[arg(long)]
        online: bool,
    },

    /// Gravar um snapshot estático (concursos + agregados globais)
    Export {
        #[arg(short, long, default_value = "megasena")]
        game: String,

        /// Arquivo de saída
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Modo interativo
    Interactive {
        #[arg(short, long, default_value = "megasena")]
        game: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let path = cli.db.clone().unwrap_or_else(db_path);
    let conn = open_db(&path)?;
    migrate(&conn)?;
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Import { game, file } => cmd_import(&conn, &game, &file),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::List { game, last } => cmd_list(&conn, &game, last),
        Command::Sync { game, snapshot } => cmd_sync(&conn, &config, &game, snapshot.as_deref()),
        Command::Stats { game, window, bets } => cmd_stats(&conn, &config, &game, window, bets.as_deref()),
        Command::Profile { game, number, months } => cmd_profile(&conn, &config, &game, &number, months),
        Command::Delays { game } => cmd_delays(&conn, &game),
        Command::Backtest {
            game,
            bets,
            window,
            online,
        } => cmd_backtest(&conn, config, &game, &bets, window, online),
        Command::Export { game, output } => cmd_export(&conn, &config, &game, &output),
        Command::Interactive { game } => {
            let geometry = GameGeometry::for_slug(&game)?;
            let session = Session::new(Box::new(http_source(&config)?), config);
            interactive::run_interactive(&conn, runtime()?, session, geometry)
        }
    }
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Não foi possível iniciar o runtime")
}

fn http_source(config: &EngineConfig) -> Result<HttpDrawSource> {
    HttpDrawSource::new(&config.source.base_url, config.source.timeout())
        .context("Não foi possível criar o cliente HTTP")
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

/// Base vazia para a modalidade: avisa e devolve `true`.
fn empty_store(conn: &Connection, game: &str) -> Result<bool> {
    if count_draws(conn, game)? == 0 {
        println!("Base vazia para {game}. Rode antes : loterias import --game {game} ou loterias sync --game {game}");
        return Ok(true);
    }
    Ok(false)
}

pub(crate) fn parse_number(geometry: &GameGeometry, raw: &str) -> Result<Ball> {
    let number: Ball = raw.parse()?;
    if !geometry.contains(number) {
        bail!(
            "Dezena {} fora do volante de {} ({:02}-{:02})",
            number, geometry.slug, geometry.min_number, geometry.max_number
        );
    }
    Ok(number)
}

fn cmd_import(conn: &Connection, game: &str, file: &Path) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;
    let result = import::import_csv(conn, &geometry, file)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, game: &str, last: u32) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;
    if empty_store(conn, game)? {
        return Ok(());
    }
    let draws = fetch_last_draws(conn, &geometry, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_sync(conn: &Connection, config: &EngineConfig, game: &str, snapshot: Option<&Path>) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;
    let mut seed = fetch_series(conn, &geometry)?;
    if seed.is_empty() {
        if let Some(loaded) = snapshot.map(|p| load_snapshot(p, &geometry)).transpose()?.flatten() {
            println!("Base vazia: usando {} concursos do snapshot.", loaded.draws.len());
            seed = loaded.series();
        }
    }

    let source = http_source(config)?;
    let pb = spinner(format!("Conciliando {} ...", geometry.slug))?;
    let result = runtime()?.block_on(reconcile(&source, &geometry, Some(seed.as_slice())));
    pb.finish_and_clear();

    let reconciliation = match result {
        Ok(reconciliation) => reconciliation,
        Err(e) if e.is_retryable() => {
            println!("Fonte indisponível; a base local não foi alterada. Tente novamente mais tarde.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let before = max_contest(conn, &geometry.slug)?;
    let inserted = insert_draws(conn, &geometry.slug, reconciliation.series.as_slice())?;
    let after = max_contest(conn, &geometry.slug)?;
    display_reconciliation(&geometry.slug, &reconciliation, inserted, (before, after));
    Ok(())
}

fn cmd_stats(
    conn: &Connection,
    config: &EngineConfig,
    game: &str,
    window: u32,
    bets: Option<&Path>,
) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;

    if let Some(path) = bets {
        let bets = load_bets(path)?;
        let games = selections_for_game(&bets, &geometry.slug);
        let stats = compute_aggregate(&games, &geometry, &config.stats);
        display_stats(&stats, &geometry, Mode::Personal);
        return Ok(());
    }

    if empty_store(conn, game)? {
        return Ok(());
    }
    let draws = fetch_last_draws(conn, &geometry, window)?;
    let stats = compute_aggregate(&draws, &geometry, &config.stats);
    display_stats(&stats, &geometry, Mode::Global);
    Ok(())
}

fn cmd_profile(
    conn: &Connection,
    config: &EngineConfig,
    game: &str,
    raw_number: &str,
    months: Option<u32>,
) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;
    let number = parse_number(&geometry, raw_number)?;
    if empty_store(conn, game)? {
        return Ok(());
    }

    let mut options = config.profile;
    if let Some(months) = months {
        options.window_months = months;
    }
    let series = fetch_series(conn, &geometry)?;
    let profile = number_profile(number, &series, &geometry, &options);
    display_profile(&profile, &geometry, options.window_months);
    Ok(())
}

fn cmd_delays(conn: &Connection, game: &str) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;
    if empty_store(conn, game)? {
        return Ok(());
    }
    let series = fetch_series(conn, &geometry)?;
    display_delays(&delay_table(&series, &geometry), &geometry.slug);
    Ok(())
}

fn cmd_backtest(
    conn: &Connection,
    config: EngineConfig,
    game: &str,
    bets_path: &Path,
    window: u32,
    online: bool,
) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;
    let bets = load_bets(bets_path)?;
    let game_config = config.game(&geometry.slug);
    if game_config.prize_table.is_empty() {
        println!("Sem tabela de prêmios para {}: todos os prêmios valem zero.", geometry.slug);
    }

    let series = fetch_series(conn, &geometry)?;
    let report = if online {
        let mut session = Session::new(Box::new(http_source(&config)?), config);
        let rt = runtime()?;
        let pb = spinner(format!("Completando a janela de {} ...", geometry.slug))?;
        let result = rt.block_on(session.backtest(&geometry, Some(series.as_slice()), &bets, window));
        pb.finish_and_clear();
        let report = result?;
        // concursos recuperados durante a simulação também vão para a base
        let refreshed = rt.block_on(session.series(&geometry, None))?;
        insert_draws(conn, &geometry.slug, refreshed.as_slice())?;
        report
    } else {
        backtest_bets(
            &bets,
            &series,
            &geometry,
            &game_config.prize_table,
            game_config.ticket_price,
            window as usize,
        )
    };

    display_backtest(&report, &geometry.slug);
    Ok(())
}

fn cmd_export(conn: &Connection, config: &EngineConfig, game: &str, output: &Path) -> Result<()> {
    let geometry = GameGeometry::for_slug(game)?;
    if empty_store(conn, game)? {
        return Ok(());
    }
    let series = fetch_series(conn, &geometry)?;
    let stats = compute_aggregate(series.as_slice(), &geometry, &config.stats);
    let snapshot = StaticSnapshot {
        game: geometry.slug.clone(),
        draws: series.into_vec(),
        stats: Some(stats),
    };
    save_snapshot(output, &snapshot)?;
    println!("Snapshot de {} concursos gravado em {}", snapshot.draws.len(), output.display());
    Ok(())
}

pub(crate) fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin()
        .read_line(&mut input)
        .context("Erro de leitura")?;
    if read == 0 {
        bail!("Fim da entrada");
    }
    Ok(input.trim().to_string())
}

pub(crate) fn prompt_with_default(msg: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}] : ", msg, default))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

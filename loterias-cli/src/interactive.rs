use std::path::Path;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use loterias_db::bets::{load_bets, selections_for_game};
use loterias_db::db::{fetch_series, insert_draws, max_contest};
use loterias_db::models::{DrawSeries, GameGeometry};
use loterias_db::rusqlite::Connection;
use loterias_engine::stats::Mode;
use loterias_engine::Session;

use crate::display::{
    display_backtest, display_draws, display_profile, display_reconciliation, display_stats,
};
use crate::{parse_number, prompt, prompt_with_default};

#[derive(Debug, PartialEq)]
pub enum InteractiveCommand {
    Sync,
    History,
    Stats,
    Profile,
    Backtest,
    Personal,
    Quit,
}

fn parse_command(input: &str) -> Option<InteractiveCommand> {
    match input.trim().to_lowercase().as_str() {
        "1" | "atualizar" | "sync" => Some(InteractiveCommand::Sync),
        "2" | "historico" | "histórico" | "hist" => Some(InteractiveCommand::History),
        "3" | "estatisticas" | "estatísticas" | "stats" => Some(InteractiveCommand::Stats),
        "4" | "dezena" | "perfil" => Some(InteractiveCommand::Profile),
        "5" | "simular" | "backtest" => Some(InteractiveCommand::Backtest),
        "6" | "pessoal" | "meus" => Some(InteractiveCommand::Personal),
        "7" | "sair" | "q" | "exit" | "quit" => Some(InteractiveCommand::Quit),
        _ => None,
    }
}

fn display_menu(game: &str) {
    println!("\n── {game} ──");
    println!("  1. atualizar     Conciliar com a fonte ao vivo");
    println!("  2. historico     Últimos concursos");
    println!("  3. estatisticas  Agregados do modo global");
    println!("  4. dezena        Perfil de uma dezena");
    println!("  5. simular       Simular minhas apostas");
    println!("  6. pessoal       Agregados dos meus jogos");
    println!("  7. sair");
}

/// Estado de uma sessão interativa: a base local semeia a conciliação.
struct Interactive<'a> {
    conn: &'a Connection,
    runtime: Runtime,
    session: Session,
    geometry: GameGeometry,
    seed: DrawSeries,
}

impl Interactive<'_> {
    fn sync(&mut self) -> Result<()> {
        let reconciliation = self
            .runtime
            .block_on(self.session.refresh(&self.geometry, Some(self.seed.as_slice())))?;
        let before = max_contest(self.conn, &self.geometry.slug)?;
        let inserted = insert_draws(self.conn, &self.geometry.slug, reconciliation.series.as_slice())?;
        let after = max_contest(self.conn, &self.geometry.slug)?;
        display_reconciliation(&self.geometry.slug, &reconciliation, inserted, (before, after));
        self.seed = reconciliation.series;
        Ok(())
    }

    fn history(&mut self) -> Result<()> {
        let n: usize = prompt_with_default("Quantidade de concursos", "10")?
            .parse()
            .context("Número inválido")?;
        let series = self
            .runtime
            .block_on(self.session.series(&self.geometry, Some(self.seed.as_slice())))?;
        display_draws(series.recent(n));
        Ok(())
    }

    fn stats(&mut self) -> Result<()> {
        let stats = self
            .runtime
            .block_on(self.session.global_stats(&self.geometry, Some(self.seed.as_slice())))?;
        display_stats(&stats, &self.geometry, Mode::Global);
        Ok(())
    }

    fn profile(&mut self) -> Result<()> {
        let raw = prompt(&format!(
            "Dezena ({:02}-{:02}) : ",
            self.geometry.min_number, self.geometry.max_number
        ))?;
        let number = parse_number(&self.geometry, &raw)?;
        let profile = self
            .runtime
            .block_on(self.session.profile(&self.geometry, Some(self.seed.as_slice()), number))?;
        display_profile(&profile, &self.geometry, self.session.config().profile.window_months);
        Ok(())
    }

    fn backtest(&mut self) -> Result<()> {
        let path = prompt_with_default("Arquivo de apostas", "apostas.json")?;
        let window: u32 = prompt_with_default("Concursos simulados", "10")?
            .parse()
            .context("Número inválido")?;
        let bets = load_bets(Path::new(&path))?;
        let report = self.runtime.block_on(self.session.backtest(
            &self.geometry,
            Some(self.seed.as_slice()),
            &bets,
            window,
        ))?;
        display_backtest(&report, &self.geometry.slug);
        Ok(())
    }

    fn personal(&self) -> Result<()> {
        let path = prompt_with_default("Arquivo de apostas", "apostas.json")?;
        let bets = load_bets(Path::new(&path))?;
        let games = selections_for_game(&bets, &self.geometry.slug);
        let stats = self.session.personal_stats(&self.geometry, &games);
        display_stats(&stats, &self.geometry, Mode::Personal);
        Ok(())
    }
}

pub fn run_interactive(
    conn: &Connection,
    runtime: Runtime,
    session: Session,
    geometry: GameGeometry,
) -> Result<()> {
    println!("Bem-vindo ao modo interativo do loterias!");

    let seed = fetch_series(conn, &geometry)?;
    let mut state = Interactive {
        conn,
        runtime,
        session,
        geometry,
        seed,
    };

    loop {
        display_menu(&state.geometry.slug);
        let input = match prompt("> ") {
            Ok(s) => s,
            Err(_) => break, // EOF / Ctrl+D
        };

        if input.is_empty() {
            continue;
        }

        let result = match parse_command(&input) {
            Some(InteractiveCommand::Quit) => {
                println!("Até logo!");
                break;
            }
            Some(InteractiveCommand::Sync) => state.sync(),
            Some(InteractiveCommand::History) => state.history(),
            Some(InteractiveCommand::Stats) => state.stats(),
            Some(InteractiveCommand::Profile) => state.profile(),
            Some(InteractiveCommand::Backtest) => state.backtest(),
            Some(InteractiveCommand::Personal) => state.personal(),
            None => {
                println!("Comando desconhecido: '{}'. Digite um número (1-7) ou o nome do comando.", input);
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("Erro: {e:#}");
        }
    }

    let cache = state.session.cache();
    tracing::debug!(hits = cache.hits(), misses = cache.misses(), "cache da sessão");
    Ok(())
}

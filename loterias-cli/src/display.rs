use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};

use crate::import::ImportResult;
use loterias_db::models::{Ball, DrawRecord, GameGeometry};
use loterias_engine::backtest::BacktestReport;
use loterias_engine::delay::{DelayRow, NumberProfile, Trend};
use loterias_engine::reconcile::Reconciliation;
use loterias_engine::stats::{AggregateStats, Mode};

/// Quantidade de dezenas nas listas de quentes/frias e de atrasos.
const HIGHLIGHT: usize = 10;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn format_balls(balls: &[Ball]) -> String {
    balls
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(" - ")
}

fn format_brl(amount: f64) -> String {
    format!("R$ {:.2}", amount)
}

pub fn display_draws(draws: &[DrawRecord]) {
    if draws.is_empty() {
        println!("Nenhum concurso para exibir.");
        return;
    }

    let mut table = new_table(vec!["Concurso", "Data", "Dezenas", "Acumulou", "Arrecadação", "Ganhadores"]);

    for draw in draws {
        let collected = draw
            .collected_amount()
            .map(format_brl)
            .unwrap_or_else(|| "—".to_string());
        let winners = draw
            .winners_count()
            .map(|w| w.to_string())
            .unwrap_or_else(|| "—".to_string());

        table.add_row(vec![
            draw.contest_number().to_string(),
            draw.draw_date().format("%d/%m/%Y").to_string(),
            format_balls(draw.drawn_numbers()),
            if draw.accumulated() { "sim" } else { "não" }.to_string(),
            collected,
            winners,
        ]);
    }

    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Importação concluída :");
    println!("  Linhas lidas        : {}", result.total_records);
    println!("  Inseridos           : {}", result.inserted);
    println!("  Duplicados ignorados: {}", result.skipped);
    if result.errors > 0 {
        println!("  Erros               : {}", result.errors);
    }
}

/// Maior concurso da base antes e depois da gravação.
fn format_store_progress(before: u32, after: u32) -> String {
    match (before, after) {
        (0, 0) => "vazia".to_string(),
        (0, a) => format!("vazia → {a}"),
        (b, a) if b == a => format!("{b} (sem concursos novos)"),
        (b, a) => format!("{b} → {a}"),
    }
}

pub fn display_reconciliation(
    game: &str,
    reconciliation: &Reconciliation,
    inserted: u32,
    stored: (u32, u32),
) {
    let series = &reconciliation.series;
    println!("\n🔄 Sincronização de {game}: {}", reconciliation.strategy);
    println!("  Concursos na série  : {}", series.len());
    if let Some(latest) = series.latest() {
        println!(
            "  Último concurso     : {} ({})",
            latest.contest_number(),
            latest.draw_date().format("%d/%m/%Y")
        );
    }
    println!("  Novos na base       : {}", inserted);
    println!("  Maior concurso local: {}", format_store_progress(stored.0, stored.1));
    if reconciliation.is_partial() {
        println!("  Buscas perdidas     : {}", reconciliation.lost);
    }

    let missing = series.missing_contests();
    if !missing.is_empty() {
        let shown: Vec<String> = missing.iter().take(HIGHLIGHT).map(|c| c.to_string()).collect();
        let more = if missing.len() > HIGHLIGHT {
            format!(" (+{})", missing.len() - HIGHLIGHT)
        } else {
            String::new()
        };
        println!("  Concursos faltando  : {}{}", shown.join(", "), more);
    }
}

pub fn display_stats(stats: &AggregateStats, geometry: &GameGeometry, mode: Mode) {
    let unit = match mode {
        Mode::Global => "concursos",
        Mode::Personal => "jogos",
    };
    println!(
        "\n📊 Estatísticas ({mode}) de {} sobre {} {unit}\n",
        geometry.slug, stats.record_count
    );
    if stats.record_count == 0 {
        println!("Nada para analisar.");
        return;
    }

    let (hot, cold) = stats.hot_cold(geometry, HIGHLIGHT);
    let mut table = new_table(vec!["Quentes", "Frequência", "Frias", "Frequência"]);
    for (h, c) in hot.iter().zip(cold.iter()) {
        table.add_row(vec![
            Cell::new(h.number).fg(Color::Green),
            Cell::new(h.count),
            Cell::new(c.number).fg(Color::Red),
            Cell::new(c.count),
        ]);
    }
    println!("{table}");

    let total = stats.even_count + stats.odd_count;
    let pct = |n: u32| if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 };
    println!("\n── Perfil ──");
    println!("  Pares / ímpares     : {} / {} ({:.1}% pares)", stats.even_count, stats.odd_count, pct(stats.even_count));
    println!("  Primos              : {} ({:.1}%)", stats.prime_count, pct(stats.prime_count));
    println!("  Soma média          : {:.1}", stats.average_sum);
    println!("  Pares consecutivos  : {}", stats.consecutive_count);

    let q = stats.quadrants;
    println!("  Quadrantes          : Q1 {} | Q2 {} | Q3 {} | Q4 {}", q.q1, q.q2, q.q3, q.q4);

    println!("\n── Faixas de soma ──");
    let mut table = new_table(vec!["Faixa", "Ocorrências"]);
    for bucket in &stats.sum_ranges {
        table.add_row(vec![bucket.label.clone(), bucket.count.to_string()]);
    }
    println!("{table}");

    if !stats.top_pairs.is_empty() {
        println!("\n── Duplas mais frequentes ──");
        let mut table = new_table(vec!["Dupla", "Ocorrências"]);
        for pair in &stats.top_pairs {
            table.add_row(vec![
                format!("{} - {}", pair.pair.0, pair.pair.1),
                pair.count.to_string(),
            ]);
        }
        println!("{table}");
    }

    if mode == Mode::Global && !stats.delays.is_empty() {
        println!("\n── Maiores atrasos ──");
        let mut delays = stats.delays.clone();
        delays.sort_by(|a, b| b.delay.cmp(&a.delay));
        let mut table = new_table(vec!["Dezena", "Atraso"]);
        for d in delays.iter().take(HIGHLIGHT) {
            table.add_row(vec![d.number.to_string(), d.delay.to_string()]);
        }
        println!("{table}");
    }
}

fn trend_color(trend: Trend) -> Color {
    match trend {
        Trend::VeryHigh => Color::Green,
        Trend::High => Color::Cyan,
        Trend::Normal => Color::White,
        Trend::Low => Color::Red,
    }
}

pub fn display_profile(profile: &NumberProfile, geometry: &GameGeometry, months: u32) {
    println!("\n🔎 Dezena {} em {}\n", profile.number, geometry.slug);

    let mut table = new_table(vec!["Indicador", "Valor"]);
    table.add_row(vec![
        Cell::new(format!("Frequência ({} meses)", months)),
        Cell::new(format!(
            "{:.1}% ({} de {} concursos)",
            profile.frequency_pct, profile.window_occurrences, profile.window_draws
        )),
    ]);
    table.add_row(vec![
        Cell::new("Probabilidade teórica"),
        Cell::new(format!("{:.1}%", geometry.theoretical_probability() * 100.0)),
    ]);
    table.add_row(vec![
        Cell::new("Tendência"),
        Cell::new(profile.trend).fg(trend_color(profile.trend)),
    ]);
    table.add_row(vec![
        Cell::new("Atraso atual"),
        Cell::new(profile.current_delay),
    ]);
    table.add_row(vec![
        Cell::new("Atraso médio"),
        Cell::new(
            profile
                .average_delay
                .map(|d| format!("{:.1}", d))
                .unwrap_or_else(|| "—".to_string()),
        ),
    ]);
    let partners: Vec<String> = profile
        .partners
        .iter()
        .map(|p| format!("{} ({}x)", p.number, p.count))
        .collect();
    table.add_row(vec![
        Cell::new("Parceiras"),
        Cell::new(if partners.is_empty() { "—".to_string() } else { partners.join(", ") }),
    ]);
    println!("{table}");

    if !profile.occurrences.is_empty() {
        println!("\nÚltimas aparições :");
        display_draws(&profile.occurrences[..profile.occurrences.len().min(HIGHLIGHT)]);
    }
}

pub fn display_delays(rows: &[DelayRow], game: &str) {
    println!("\n⏳ Atrasos de {game}\n");

    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.current_delay.cmp(&a.current_delay));

    let mut table = new_table(vec!["Dezena", "Atraso atual", "Atraso médio", "Último concurso"]);
    for row in &sorted {
        let overdue = row
            .average_delay
            .map_or(false, |avg| row.current_delay as f64 > avg * 2.0);
        let color = if overdue { Color::Red } else { Color::White };
        table.add_row(vec![
            Cell::new(row.number),
            Cell::new(row.current_delay).fg(color),
            Cell::new(
                row.average_delay
                    .map(|d| format!("{:.1}", d))
                    .unwrap_or_else(|| "—".to_string()),
            ),
            Cell::new(
                row.last_contest
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "nunca".to_string()),
            ),
        ]);
    }
    println!("{table}");
}

pub fn display_backtest(report: &BacktestReport, game: &str) {
    println!(
        "\n💰 Simulação de {} jogos de {game} sobre {} concursos\n",
        report.games, report.draws
    );
    if report.games == 0 || report.draws == 0 {
        println!("Nenhum jogo ou concurso para simular.");
        return;
    }

    let mut table = new_table(vec!["Concurso", "Data", "Acertos por jogo", "Melhor", "Prêmio"]);
    for outcome in &report.outcomes {
        let hits: Vec<String> = outcome.hits.iter().map(|h| h.to_string()).collect();
        let color = if outcome.prize > 0.0 { Color::Green } else { Color::White };
        table.add_row(vec![
            Cell::new(outcome.contest),
            Cell::new(outcome.date.format("%d/%m/%Y")),
            Cell::new(hits.join(" ")),
            Cell::new(outcome.best_hits),
            Cell::new(format_brl(outcome.prize)).fg(color),
        ]);
    }
    println!("{table}");

    let roi_color = if report.roi_pct >= 0.0 { Color::Green } else { Color::Red };
    let mut summary = new_table(vec!["Indicador", "Valor"]);
    summary.add_row(vec![Cell::new("Investimento"), Cell::new(format_brl(report.total_investment))]);
    summary.add_row(vec![Cell::new("Retorno"), Cell::new(format_brl(report.total_return))]);
    summary.add_row(vec![Cell::new("Saldo"), Cell::new(format_brl(report.net()))]);
    summary.add_row(vec![Cell::new("ROI"), Cell::new(format!("{:.1}%", report.roi_pct)).fg(roi_color)]);
    summary.add_row(vec![Cell::new("Média de acertos"), Cell::new(format!("{:.2}", report.average_hits))]);
    summary.add_row(vec![Cell::new("Constância"), Cell::new(format!("{:.0}%", report.consistency_pct))]);
    summary.add_row(vec![Cell::new("Simetria"), Cell::new(format!("{:.0}", report.symmetry_score))]);
    summary.add_row(vec![Cell::new("Fator vizinhança"), Cell::new(format!("{:.0}", report.neighbor_factor))]);
    summary.add_row(vec![
        Cell::new("Dezenas fantasma"),
        Cell::new(if report.ghost_numbers.is_empty() {
            "—".to_string()
        } else {
            format_balls(&report.ghost_numbers)
        }),
    ]);
    if let Some(best) = &report.best_ever {
        summary.add_row(vec![
            Cell::new("Melhor acerto"),
            Cell::new(format!(
                "{} acertos no concurso {} ({}), jogo #{}",
                best.hits,
                best.contest,
                best.date.format("%d/%m/%Y"),
                best.game_index + 1
            )),
        ]);
    }
    println!("\n{summary}");
}

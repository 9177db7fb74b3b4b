//! Prompt text and response parsing shared by all backends.

use std::collections::BTreeSet;

use chrono::Utc;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{truncate_chars, Article, Candidate, Discipline, DisciplineScore, ScoringResult};

/// Upper bound on article text inside the deep-read prompt.
const PROMPT_TEXT_CHARS: usize = 5000;

const CURRICULUM: &str = "\
Samfundsfag A (stx) består af fem discipliner. Centrale teorier og begreber:

POLITIK: Lipset-Rokkan, fordelings- og værdipolitik, Molins model, Kaare Strøm, \
medianvælgerteorien, partityper, kerne- og marginalvælgere, issuevoting, rational choice, \
ideologier, demokratiformer, den parlamentariske styringskæde, magtformer, medialisering, \
framing, nyhedskriterier, RAS-modellen.

SOCIOLOGI: Socialisering, normer og sanktioner, identitet, social arv, mønsterbrydere, \
social mobilitet, Giddens, Bourdieu (kapitaler, habitus), Honneth, Habermas, Beck, Ziehe, \
Reckwitz, køn og doing gender, Connell, Hofstede, struktur/aktør, minoriteter og segregation.

ØKONOMI: BNP, inflation, ledighed, betalingsbalance, konjunkturer, det økonomiske kredsløb, \
multiplikator, keynesianisme, monetarisme, markedsmekanismen, finans-, penge-, struktur- og \
valutapolitik, flexicurity, priselasticitet, Gini-koefficient, velfærdsmodeller.

INTERNATIONAL POLITIK: EU's institutioner, mellemstatsligt/overstatsligt samarbejde, \
integrationsteorier, direktiv og forordning, globalisering, WTO, NATO, velfærdsstatens \
udfordringer, Huntingtons civilisationsteori.

METODE: Kvalitativ og kvantitativ metode, hypoteser, operationalisering, validitet, \
komparativ metode, casestudier.";

pub const SKIM_SYSTEM_PROMPT: &str = concat!(
    "Du er en erfaren samfundsfagslærer (stx), der skimmer nyhedsoverskrifter for at finde ",
    "artikler, som elever kan analysere med fagets teorier og begreber.\n\n",
    "Samfundsfag A (stx) består af fem discipliner: politik, sociologi, økonomi, ",
    "international politik og metode.\n\n",
    "Vær selektiv. Afvis sport, underholdning, vejr, kriminalitet uden samfundsmæssig ",
    "dimension og lokalnyheder uden bredere relevans.\n\n",
    "Du svarer KUN med gyldig JSON."
);

pub const DEEP_READ_SYSTEM_PROMPT: &str = concat!(
    "Du er en erfaren samfundsfagslærer (stx), der vurderer om en nyhedsartikel kan bruges ",
    "som genstandsfelt for analyse i undervisningen.\n\n",
    "Eleverne skal kunne ANVENDE konkrete teorier og begreber på artiklen, ikke blot nævne dem. ",
    "De fleste nyheder er ikke gode undervisningsartikler (score 1-4). Score 7 eller derover ",
    "kræver, at du kan beskrive en konkret analyseopgave.\n\n",
    "Skala: 9-10 oplagt eksamenscase med kobling til flere teorier; 7-8 tydelig kobling til ",
    "mindst én teori; 5-6 mulig, men begrænset dybde; 3-4 svag kobling; 1-2 ikke brugbar.\n\n",
    "I 'explanation' nævner du 1-3 teorier eller begreber, der kan anvendes, og hvad eleverne ",
    "konkret kan analysere. Ved score under 5 forklarer du hvorfor.\n\n",
    "Du svarer KUN med gyldig JSON."
);

pub fn build_skim_prompt(candidates: &[Candidate]) -> String {
    let lines: Vec<String> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if c.teaser.is_empty() {
                format!("{i}: {}", c.title)
            } else {
                format!("{i}: {} — {}", c.title, c.teaser)
            }
        })
        .collect();

    format!(
        "{CURRICULUM}\n\n\
         Her er {} nyhedsoverskrifter. Vælg dem, der sandsynligvis kan bruges som \
         genstandsfelt i Samfundsfag A.\n\n{}\n\n\
         Svar med JSON:\n{{\"relevant_indices\": [<indeksnumre der er værd at læse>]}}",
        candidates.len(),
        lines.join("\n")
    )
}

pub fn build_deep_read_prompt(article: &Article) -> String {
    let language_note = if article.language == "en" {
        " (artiklen er på engelsk; vurder relevansen for dansk Samfundsfag A, også komparativt)"
    } else {
        ""
    };
    let text = article.scoring_text();

    format!(
        "{CURRICULUM}\n\n\
         Vurder denne artikel fra {source}{language_note} som undervisningsmateriale.\n\n\
         Titel: {title}\n\n\
         Artikeltekst:\n{text}\n\n\
         Svar med dette JSON-format:\n\
         {{\n\
         \x20 \"overall_score\": <1-10>,\n\
         \x20 \"disciplines\": {{\"sociologi\": <0-10>, \"politik\": <0-10>, \"okonomi\": <0-10>, \
         \"international_politik\": <0-10>, \"metode\": <0-10>}},\n\
         \x20 \"primary_discipline\": \"<sociologi|politik|okonomi|international_politik|metode>\",\n\
         \x20 \"explanation\": \"<hvilke teorier kan eleverne anvende, og hvad kan de analysere?>\"\n\
         }}",
        source = article.source_name,
        title = article.title,
        text = truncate_chars(&text, PROMPT_TEXT_CHARS),
    )
}

/// Strip a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string line ("json", "JSON", or nothing).
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    match body.rsplit_once("```") {
        Some((inner, _)) => inner.trim(),
        None => body.trim(),
    }
}

/// Integer value of a JSON number or numeric string. Floats truncate.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

pub fn parse_skim_response(raw: &str, candidate_count: usize) -> Result<Vec<usize>> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| AppError::MalformedResponse(format!("skim response is not JSON: {e}")))?;

    let indices = match &value {
        Value::Object(map) => map.get("relevant_indices"),
        Value::Array(_) => Some(&value),
        _ => None,
    }
    .and_then(Value::as_array)
    .ok_or_else(|| AppError::MalformedResponse("skim response has no relevant_indices array".into()))?;

    let selected: BTreeSet<usize> = indices
        .iter()
        .filter_map(as_integer)
        .filter_map(|i| usize::try_from(i).ok())
        .filter(|&i| i < candidate_count)
        .collect();

    Ok(selected.into_iter().collect())
}

pub fn parse_scoring_response(raw: &str, article_url: &str, backend: &str) -> Result<ScoringResult> {
    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| AppError::MalformedResponse(format!("scoring response is not JSON: {e}")))?;
    let data = value
        .as_object()
        .ok_or_else(|| AppError::MalformedResponse("scoring response is not a JSON object".into()))?;

    let overall = data
        .get("overall_score")
        .and_then(as_integer)
        .ok_or_else(|| AppError::MalformedResponse("overall_score missing or not numeric".into()))?;
    if !(1..=10).contains(&overall) {
        return Err(AppError::MalformedResponse(format!("overall_score {overall} outside 1..=10")));
    }

    let mut disciplines = DisciplineScore::default();
    match data.get("disciplines") {
        None | Some(Value::Null) => {}
        Some(Value::Object(scores)) => {
            for discipline in Discipline::ALL {
                let score = scores.get(discipline.as_str()).and_then(as_integer).unwrap_or(0);
                disciplines.set(discipline, score.clamp(0, 10) as u8);
            }
        }
        Some(_) => {
            return Err(AppError::MalformedResponse("disciplines is not a JSON object".into()));
        }
    }

    let text_field = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    Ok(ScoringResult {
        article_url: article_url.to_string(),
        overall_score: overall as u8,
        disciplines,
        primary_discipline: text_field("primary_discipline").into(),
        explanation: text_field("explanation"),
        backend_used: backend.to_string(),
        scored_at: Utc::now(),
    })
}

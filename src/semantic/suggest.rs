//! Sugerencias de nombres para identificadores no definidos.

use std::fmt::{self, Display};

/// Candidatos más cercanos a un nombre desconocido.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Suggestions {
    pub best: Option<String>,
    pub others: Vec<String>,
}

/// Máximo de alternativas adicionales a la mejor.
const MAX_OTHERS: usize = 2;

/// Distancia de edición por encima de la cual un candidato se descarta.
fn threshold(name: &str) -> usize {
    (name.chars().count() / 2).max(1)
}

/// Ordena los candidatos por distancia de Levenshtein.
///
/// Los empates se resuelven por longitud y luego lexicográficamente,
/// por lo cual el resultado no depende del orden de entrada. Se
/// reportan como alternativas los candidatos a lo sumo una unidad más
/// lejanos que el mejor.
pub fn suggest<'a, I>(name: &str, candidates: I) -> Suggestions
where
    I: IntoIterator<Item = &'a str>,
{
    let limit = threshold(name);

    let mut ranked: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|&candidate| candidate != name)
        .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
        .filter(|&(distance, _)| distance <= limit)
        .collect();

    ranked.sort_by(|(a_distance, a), (b_distance, b)| {
        a_distance
            .cmp(b_distance)
            .then(a.len().cmp(&b.len()))
            .then(a.cmp(b))
    });

    ranked.dedup_by(|(_, a), (_, b)| a == b);

    let mut ranked = ranked.into_iter();
    let (best_distance, best) = match ranked.next() {
        Some(best) => best,
        None => return Suggestions::default(),
    };

    let others = ranked
        .take_while(|&(distance, _)| distance <= best_distance + 1)
        .take(MAX_OTHERS)
        .map(|(_, candidate)| candidate.to_owned())
        .collect();

    Suggestions {
        best: Some(best.to_owned()),
        others,
    }
}

impl Display for Suggestions {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let best = match &self.best {
            Some(best) => best,
            None => return Ok(()),
        };

        write!(fmt, ". Did you mean '{}'?", best)?;

        for (i, other) in self.others.iter().enumerate() {
            let prefix = if i == 0 { " Or perhaps: " } else { ", " };
            write!(fmt, "{}'{}'", prefix, other)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transposition_finds_declared_name() {
        let found = suggest("couter", ["counter", "count", "delay", "millis"]);
        assert_eq!(found.best.as_deref(), Some("counter"));
    }

    #[test]
    fn ties_break_by_length_then_name() {
        let found = suggest("led", ["lex", "leds", "lea", "red"]);
        assert_eq!(found.best.as_deref(), Some("lea"));
        assert_eq!(found.others, vec!["lex".to_owned(), "red".to_owned()]);
    }

    #[test]
    fn order_of_candidates_is_irrelevant() {
        let forward = suggest("sped", ["speed", "sped1", "spend"]);
        let backward = suggest("sped", ["spend", "sped1", "speed"]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn distant_names_are_not_suggested() {
        let found = suggest("temperature", ["x", "led"]);
        assert_eq!(found, Suggestions::default());
        assert_eq!(found.to_string(), "");
    }

    #[test]
    fn message_format() {
        let found = Suggestions {
            best: Some("counter".into()),
            others: vec!["count".into(), "county".into()],
        };

        assert_eq!(
            found.to_string(),
            ". Did you mean 'counter'? Or perhaps: 'count', 'county'"
        );
    }
}

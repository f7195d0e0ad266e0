// src/regions.rs

/// An autonomous community or city as the REData API knows it: the
/// display name used in file names and the numeric `geo_ids` code the
/// API expects in queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub code: u32,
}

/// Every region the upstream API reports on, in the order extractions
/// walk them.
pub static REGIONS: &[Region] = &[
    Region { name: "Ceuta", code: 8744 },
    Region { name: "Melilla", code: 8745 },
    Region { name: "Andalucía", code: 4 },
    Region { name: "Aragón", code: 5 },
    Region { name: "Cantabria", code: 6 },
    Region { name: "Castilla - La Mancha", code: 7 },
    Region { name: "Castilla y León", code: 8 },
    Region { name: "Cataluña", code: 9 },
    Region { name: "País Vasco", code: 10 },
    Region { name: "Principado de Asturias", code: 11 },
    Region { name: "Comunidad de Madrid", code: 13 },
    Region { name: "Comunidad Foral de Navarra", code: 14 },
    Region { name: "Comunitat Valenciana", code: 15 },
    Region { name: "Extremadura", code: 16 },
    Region { name: "Galicia", code: 17 },
    Region { name: "Illes Balears", code: 8743 },
    Region { name: "Canarias", code: 8742 },
    Region { name: "Región de Murcia", code: 21 },
    Region { name: "La Rioja", code: 20 },
];

/// Look up a region's API code by its exact display name.
pub fn code_for(name: &str) -> Option<u32> {
    REGIONS.iter().find(|r| r.name == name).map(|r| r.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn covers_all_nineteen_regions() {
        assert_eq!(REGIONS.len(), 19);
        let names: HashSet<&str> = REGIONS.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), 19, "region names must be unique");
        let codes: HashSet<u32> = REGIONS.iter().map(|r| r.code).collect();
        assert_eq!(codes.len(), 19, "region codes must be unique");
    }

    #[test]
    fn looks_up_codes_by_name() {
        assert_eq!(code_for("Andalucía"), Some(4));
        assert_eq!(code_for("Illes Balears"), Some(8743));
        assert_eq!(code_for("Ceuta"), Some(8744));
        assert_eq!(code_for("Atlantis"), None);
    }
}

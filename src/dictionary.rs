use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered keyword-to-category lookup. Classification is first-match-wins:
/// the first category with a keyword contained in the uppercased input
/// claims it, otherwise the fallback (`OUTROS`) applies.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    categories: Vec<(String, Vec<String>)>,
    fallback: String,
}

impl KeywordTable {
    pub fn new(categories: Vec<(&str, Vec<&str>)>, fallback: &str) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(|(cat, kws)| {
                    (
                        cat.to_string(),
                        kws.into_iter().map(|k| k.to_string()).collect(),
                    )
                })
                .collect(),
            fallback: fallback.to_string(),
        }
    }

    pub fn classify(&self, name: &str) -> &str {
        let upper = name.to_uppercase();
        for (category, keywords) in &self.categories {
            if keywords.iter().any(|kw| upper.contains(kw.as_str())) {
                return category;
            }
        }
        &self.fallback
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .map(|(c, _)| c.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
    }
}

/// Static port metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub code: &'static str,
    pub full_name: &'static str,
    pub state: &'static str,
    pub country: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub website: &'static str,
    pub data_source: &'static str,
}

/// Expected type of a field in the lineup schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Datetime,
}

/// Field-level metadata usable for single-value ad hoc validation,
/// independent of the bulk `Validator`.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub description: &'static str,
    pub data_type: FieldType,
    pub required: bool,
    pub valid_values: Option<Vec<&'static str>>,
    pub example: &'static str,
}

/// Immutable classification and metadata tables, constructed once and passed
/// explicitly into the stages that need them.
///
/// Note the two ship-type tables: `ship_types` backs the ad hoc dictionary
/// classifier while `enrichment_ship_types` backs the Silver stage. Their
/// keyword sets differ (GRANELEIRO and several synonyms exist only in the
/// dictionary table), so the same ship name can classify differently between
/// the two. They are kept as separately configurable tables on purpose.
#[derive(Debug, Clone)]
pub struct ClassificationDictionary {
    pub product_categories: KeywordTable,
    pub ship_types: KeywordTable,
    pub enrichment_ship_types: KeywordTable,
    ports: BTreeMap<&'static str, PortInfo>,
    fields: BTreeMap<&'static str, FieldDef>,
}

impl Default for ClassificationDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassificationDictionary {
    pub fn new() -> Self {
        let product_categories = KeywordTable::new(
            vec![
                (
                    "GRÃOS",
                    vec!["SOJA", "MILHO", "TRIGO", "ARROZ", "FEIJÃO", "GIRASSOL", "SORGO"],
                ),
                (
                    "AÇÚCAR",
                    vec!["AÇÚCAR", "SUGAR", "AÇÚCAR CRISTAL", "AÇÚCAR REFINADO"],
                ),
                (
                    "FERTILIZANTES",
                    vec!["FERTILIZANTE", "FERTILIZER", "UREIA", "FOSFATO", "POTÁSSIO"],
                ),
                (
                    "CONTAINER",
                    vec!["CONTAINER", "CONTÊINER", "CONTAINERIZED CARGO"],
                ),
                (
                    "MINÉRIOS",
                    vec!["MINÉRIO", "ORE", "IRON ORE", "MINÉRIO DE FERRO", "BAUXITA"],
                ),
                ("PETRÓLEO", vec!["PETRÓLEO", "OIL", "CRUDE OIL", "PETROLEUM"]),
                ("QUÍMICOS", vec!["QUÍMICO", "CHEMICAL", "PRODUTOS QUÍMICOS"]),
            ],
            "OUTROS",
        );

        let ship_types = KeywordTable::new(
            vec![
                ("CARGA_GERAL", vec!["BULK", "GRAIN", "CARGO", "GENERAL CARGO"]),
                ("CONTAINER", vec!["CONTAINER", "BOX", "CONTÊINER"]),
                ("TANQUE", vec!["TANKER", "OIL", "PETROLEUM", "CHEMICAL TANKER"]),
                ("RO-RO", vec!["RO-RO", "FERRY", "ROLO"]),
                ("GRANELEIRO", vec!["BULK CARRIER", "GRANELEIRO", "BULKER"]),
            ],
            "OUTROS",
        );

        // The enrichment table is the one the Silver stage uses. It predates
        // the dictionary table above and lacks GRANELEIRO and the longer
        // synonyms; a BULK CARRIER ship is CARGA_GERAL here and GRANELEIRO
        // is unreachable. Do not merge the two without product-owner
        // confirmation, since that changes observable classifications.
        let enrichment_ship_types = KeywordTable::new(
            vec![
                ("CARGA_GERAL", vec!["BULK", "GRAIN", "CARGO"]),
                ("CONTAINER", vec!["CONTAINER", "BOX"]),
                ("TANQUE", vec!["TANKER", "OIL", "PETROLEUM"]),
                ("RO-RO", vec!["RO-RO", "FERRY"]),
            ],
            "OUTROS",
        );

        let mut ports = BTreeMap::new();
        ports.insert(
            "PARANAGUÁ",
            PortInfo {
                code: "PAR",
                full_name: "Porto de Paranaguá",
                state: "Paraná",
                country: "Brasil",
                lat: -25.5200,
                lon: -48.5075,
                website: "https://www.appaweb.appa.pr.gov.br/",
                data_source: "APPA - Administração dos Portos de Paranaguá e Antonina",
            },
        );
        ports.insert(
            "SANTOS",
            PortInfo {
                code: "STS",
                full_name: "Porto de Santos",
                state: "São Paulo",
                country: "Brasil",
                lat: -23.9608,
                lon: -46.3331,
                website: "https://www.portodesantos.com.br/",
                data_source: "Codesp - Companhia Docas do Estado de São Paulo",
            },
        );

        Self {
            product_categories,
            ship_types,
            enrichment_ship_types,
            ports,
            fields: Self::field_definitions(),
        }
    }

    pub fn classify_product(&self, product: &str) -> &str {
        self.product_categories.classify(product)
    }

    pub fn classify_ship_type(&self, ship_name: &str) -> &str {
        self.ship_types.classify(ship_name)
    }

    pub fn port_info(&self, port_name: &str) -> Option<&PortInfo> {
        self.ports.get(port_name.to_uppercase().as_str())
    }

    pub fn field_definition(&self, field_name: &str) -> Option<&FieldDef> {
        self.fields.get(field_name)
    }

    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|(_, def)| def.required)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Validate one value against its field definition, independent of the
    /// bulk validator. Returns a human-readable reason on rejection.
    pub fn validate_field_value(
        &self,
        field_name: &str,
        value: &Value,
    ) -> std::result::Result<(), String> {
        let def = self
            .fields
            .get(field_name)
            .ok_or_else(|| format!("Unknown field: {}", field_name))?;

        let is_empty = value.is_null() || value.as_str().map(|s| s.is_empty()).unwrap_or(false);
        if def.required && is_empty {
            return Err(format!("Required field '{}' is empty", field_name));
        }
        if is_empty {
            return Ok(());
        }

        let type_ok = match def.data_type {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            // Datetime values travel as parseable strings.
            FieldType::Datetime => value
                .as_str()
                .map(|s| crate::types::parse_datetime(s).is_some())
                .unwrap_or(false),
        };
        if !type_ok {
            return Err(format!(
                "Field '{}' has wrong type for value {}",
                field_name, value
            ));
        }

        if let (Some(valid_values), Some(s)) = (&def.valid_values, value.as_str()) {
            if !valid_values.contains(&s) {
                return Err(format!(
                    "Field '{}' has invalid value '{}'. Valid values: {:?}",
                    field_name, s, valid_values
                ));
            }
        }

        Ok(())
    }

    fn field_definitions() -> BTreeMap<&'static str, FieldDef> {
        let mut fields = BTreeMap::new();
        fields.insert(
            "porto",
            FieldDef {
                description: "Nome do porto onde o navio está operando",
                data_type: FieldType::String,
                required: true,
                valid_values: Some(vec!["PARANAGUÁ", "SANTOS"]),
                example: "PARANAGUÁ",
            },
        );
        fields.insert(
            "navio",
            FieldDef {
                description: "Nome do navio",
                data_type: FieldType::String,
                required: true,
                valid_values: None,
                example: "MSC LORETO",
            },
        );
        fields.insert(
            "produto",
            FieldDef {
                description: "Tipo de produto/carga transportada",
                data_type: FieldType::String,
                required: true,
                valid_values: None,
                example: "SOJA",
            },
        );
        fields.insert(
            "sentido",
            FieldDef {
                description: "Direção do transporte (exportação ou importação)",
                data_type: FieldType::String,
                required: true,
                valid_values: Some(vec!["EXPORTAÇÃO", "IMPORTAÇÃO"]),
                example: "EXPORTAÇÃO",
            },
        );
        fields.insert(
            "volume",
            FieldDef {
                description: "Volume de carga em toneladas",
                data_type: FieldType::Float,
                required: false,
                valid_values: None,
                example: "65000.5",
            },
        );
        fields.insert(
            "data_chegada",
            FieldDef {
                description: "Data de chegada do navio no porto",
                data_type: FieldType::Datetime,
                required: true,
                valid_values: None,
                example: "2024-01-15 08:30:00",
            },
        );
        fields.insert(
            "data_partida",
            FieldDef {
                description: "Data de partida do navio do porto",
                data_type: FieldType::Datetime,
                required: false,
                valid_values: None,
                example: "2024-01-17 14:20:00",
            },
        );
        fields.insert(
            "armador",
            FieldDef {
                description: "Nome da empresa armadora do navio",
                data_type: FieldType::String,
                required: false,
                valid_values: None,
                example: "MSC",
            },
        );
        fields.insert(
            "agente",
            FieldDef {
                description: "Nome do agente marítimo",
                data_type: FieldType::String,
                required: false,
                valid_values: None,
                example: "WILSON SONS",
            },
        );
        fields.insert(
            "tipo_navio",
            FieldDef {
                description: "Classificação do tipo de navio baseada no nome",
                data_type: FieldType::String,
                required: false,
                valid_values: Some(vec![
                    "CARGA_GERAL",
                    "CONTAINER",
                    "TANQUE",
                    "RO-RO",
                    "GRANELEIRO",
                    "OUTROS",
                ]),
                example: "CONTAINER",
            },
        );
        fields.insert(
            "categoria_produto",
            FieldDef {
                description: "Categoria do produto baseada no tipo",
                data_type: FieldType::String,
                required: false,
                valid_values: Some(vec![
                    "GRÃOS",
                    "AÇÚCAR",
                    "FERTILIZANTES",
                    "CONTAINER",
                    "MINÉRIOS",
                    "PETRÓLEO",
                    "QUÍMICOS",
                    "OUTROS",
                ]),
                example: "GRÃOS",
            },
        );
        fields.insert(
            "categoria_volume",
            FieldDef {
                description: "Categoria do volume transportado",
                data_type: FieldType::String,
                required: false,
                valid_values: Some(vec!["Pequeno", "Médio", "Grande", "Muito Grande"]),
                example: "Grande",
            },
        );
        fields.insert(
            "status_operacao",
            FieldDef {
                description: "Status da operação do navio",
                data_type: FieldType::String,
                required: false,
                valid_values: Some(vec!["ATIVO", "CANCELADO", "ADIADO"]),
                example: "ATIVO",
            },
        );
        fields.insert(
            "flag_qualidade",
            FieldDef {
                description: "Indicador de qualidade dos dados",
                data_type: FieldType::String,
                required: false,
                valid_values: Some(vec![
                    "OK",
                    "VOLUME_BAIXO",
                    "VOLUME_ALTO",
                    "DATA_FUTURA",
                ]),
                example: "OK",
            },
        );
        fields.insert(
            "source",
            FieldDef {
                description: "Fonte dos dados (paranagua ou santos)",
                data_type: FieldType::String,
                required: true,
                valid_values: Some(vec!["paranagua", "santos"]),
                example: "paranagua",
            },
        );
        fields
    }
}

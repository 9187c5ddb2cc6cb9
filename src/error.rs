use thiserror::Error;

/// Failures while turning an uploaded workbook into a [`Table`](crate::table::Table)
///
/// The `Display` text is what the upload form shows inline, so it is written
/// for the person uploading the file.
#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("No se recibió ningún archivo. Selecciona un archivo Excel antes de enviarlo.")]
    MissingFile,

    #[error("Error al procesar el archivo. Detalle: {0}")]
    Workbook(String),

    #[error("El archivo Excel no contiene hojas.")]
    NoSheets,

    #[error(
        "Error al procesar el archivo. La hoja '{sheet}' no tiene encabezados en la fila 3."
    )]
    MissingHeaderRow { sheet: String },

    #[error("El archivo Excel debe contener una columna llamada 'Curso'.")]
    MissingCourseColumn,
}

/// Failures while aggregating a filter selection
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Debes seleccionar al menos un Curso y un Subtema para generar el análisis.")]
    EmptySelection,

    #[error("No hay datos de acierto válidos para los filtros seleccionados.")]
    NoValidData,

    #[error("La columna '{0}' no existe en los datos cargados.")]
    UnknownSubject(String),

    #[error("Valor no numérico '{value}' en '{subject}' para el curso {course}.")]
    NotAnInteger {
        subject: String,
        course: String,
        value: String,
    },

    #[error("Valor '{value}' en '{subject}' para el curso {course}; se esperaba 0 o 1.")]
    NotBinary {
        subject: String,
        course: String,
        value: i64,
    },
}

/// A session slot held a blob that no longer decodes into a table
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("stored table is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart drawing failed: {0}")]
    Drawing(String),
}
